use super::AIModel;

/// A decoded, in-memory image to caption.
#[derive(Clone)]
pub struct ImageCaptionInput {
    pub image: image::DynamicImage,
}

pub type ImageCaptionOutput = String;
pub type ImageCaptionModel = AIModel<ImageCaptionInput, ImageCaptionOutput>;
