use crate::traits::{ImageCaptionInput, ImageCaptionOutput};
use crate::Model;
use anyhow::anyhow;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::blip;
use candle_transformers::models::quantized_blip;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::debug;

pub struct BLIP {
    tokenizer: Tokenizer,
    model: quantized_blip::BlipForConditionalGeneration,
    logits_processor: LogitsProcessor,
    device: Device,
}

const BOS_TOKEN_ID: u32 = 30522;
const SEP_TOKEN_ID: u32 = 102;
const IMAGE_SIZE: u32 = 384;
const MAX_CAPTION_TOKENS: usize = 1000;

impl Model for BLIP {
    type Item = ImageCaptionInput;
    type Output = ImageCaptionOutput;

    async fn process(&mut self, item: Self::Item) -> anyhow::Result<Self::Output> {
        self.get_caption(&item.image)
    }
}

impl BLIP {
    pub async fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|_| anyhow!("failed to initialize tokenizer"))?;

        let logits_processor = LogitsProcessor::new(1337, None, None);

        let config = blip::Config::image_captioning_large();

        let device = Device::Cpu;

        let vb = quantized_blip::VarBuilder::from_gguf(model_path, &device)?;
        let model = quantized_blip::BlipForConditionalGeneration::new(&config, vb)?;

        Ok(Self {
            tokenizer,
            model,
            logits_processor,
            device,
        })
    }

    fn get_caption(&mut self, image: &image::DynamicImage) -> anyhow::Result<String> {
        debug!(
            "generating caption for {}x{} image",
            image.width(),
            image.height()
        );
        let image = preprocess(image)?.to_device(&self.device)?;
        let image_embeds = image.unsqueeze(0)?.apply(self.model.vision_model())?;

        let mut token_ids = vec![BOS_TOKEN_ID];

        // we need this to make multi time generation work
        self.model.text_decoder().reset_kv_cache();

        for index in 0..MAX_CAPTION_TOKENS {
            let context_size = if index > 0 { 1 } else { token_ids.len() };
            let start_pos = token_ids.len().saturating_sub(context_size);
            let input_ids = Tensor::new(&token_ids[start_pos..], &self.device)?.unsqueeze(0)?;
            let logits = self.model.text_decoder().forward(&input_ids, &image_embeds)?;
            let logits = logits.squeeze(0)?;
            let logits = logits.get(logits.dim(0)? - 1)?;
            let token = self.logits_processor.sample(&logits)?;
            if token == SEP_TOKEN_ID {
                break;
            }
            token_ids.push(token);
        }

        self.tokenizer
            .decode(&token_ids, true)
            .map_err(|_| anyhow!("failed to decode caption"))
    }
}

/// Resize and normalize a decoded image into the `(3, 384, 384)` tensor the
/// vision tower expects. Non-RGB inputs are converted through `to_rgb8`.
pub fn preprocess(img: &image::DynamicImage) -> candle_core::Result<Tensor> {
    let img = img
        .resize_to_fill(IMAGE_SIZE, IMAGE_SIZE, image::imageops::FilterType::Triangle)
        .to_rgb8();
    let data = img.into_raw();
    let data = Tensor::from_vec(
        data,
        (IMAGE_SIZE as usize, IMAGE_SIZE as usize, 3),
        &Device::Cpu,
    )?
    .permute((2, 0, 1))?;
    let mean =
        Tensor::new(&[0.48145466f32, 0.4578275, 0.40821073], &Device::Cpu)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&[0.26862954f32, 0.261_302_6, 0.275_777_1], &Device::Cpu)?
        .reshape((3, 1, 1))?;
    (data.to_dtype(candle_core::DType::F32)? / 255.)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_preprocess_accepts_any_mode() {
        let rgba = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            640,
            480,
            image::Rgba([12, 34, 56, 128]),
        ));
        let tensor = preprocess(&rgba).expect("preprocess rgba image");
        assert_eq!(tensor.dims(), &[3, 384, 384]);

        let gray = image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            7,
            5,
            image::Luma([200]),
        ));
        let tensor = preprocess(&gray).expect("preprocess tiny grayscale image");
        assert_eq!(tensor.dims(), &[3, 384, 384]);
    }
}
