use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILED: &str = "failed";

/// One row of the `processed_images` table.
///
/// A record starts out as `processing` and is completed exactly once, either
/// as `success` (metadata and thumbnails present) or `failed` (only
/// `error_msg` present). The caption arrives separately, after generation.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub row_id: i64,
    pub image_id: String,
    pub status: String,
    pub original_name: String,
    pub processed_at: Option<String>,
    pub processing_time: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub size_bytes: Option<i64>,
    pub thumbnail: Option<String>,
    pub caption: Option<String>,
    pub error_msg: Option<String>,
}

/// The outcome of processing one upload, written back over the pre-inserted
/// row.
#[derive(Debug, Default)]
pub struct ProcessedImageUpdate {
    pub image_id: String,
    pub status: String,
    pub processing_time: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub size_bytes: Option<i64>,
    pub thumbnail: Option<String>,
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessingStats {
    pub total: i64,
    pub failed: i64,
    pub total_processing_time_seconds: f64,
}

pub struct ImageLibrary {
    conn: Connection,
}

impl ImageLibrary {
    pub fn open(db_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        if let Some(parent_dir) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent_dir)?;
        }
        Self::init(Connection::open(db_path)?)
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS processed_images(
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                image_id VARCHAR(32) UNIQUE,
                status VARCHAR(16) DEFAULT 'processing',
                original_name VARCHAR(255),
                processed_at TEXT,
                processing_time FLOAT,
                width INTEGER,
                height INTEGER,
                format VARCHAR(8),
                size_bytes INTEGER,
                thumbnail VARCHAR(255),
                caption VARCHAR(128),
                error_msg VARCHAR(255)
            )",
            [],
        )?;

        Ok(Self { conn })
    }

    /// Pre-insert a record in `processing` state and return its public id.
    /// The id is derived from the rowid, so the record is addressable as soon
    /// as the upload response goes out.
    pub fn insert_image_row(&mut self, original_name: &str) -> anyhow::Result<String> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO processed_images(original_name, processed_at) VALUES (?1, datetime())",
            params![original_name],
        )?;
        let row_id = tx.last_insert_rowid();
        let image_id = format!("img{}", row_id);
        tx.execute(
            "UPDATE processed_images SET image_id = ?1 WHERE row_id = ?2",
            params![image_id, row_id],
        )?;
        tx.commit()?;

        Ok(image_id)
    }

    pub fn update_image_data(&mut self, update: &ProcessedImageUpdate) -> anyhow::Result<()> {
        self.conn.execute(
            "UPDATE processed_images SET
                status = ?1, processing_time = ?2, width = ?3, height = ?4,
                format = ?5, size_bytes = ?6, thumbnail = ?7, error_msg = ?8
             WHERE image_id = ?9",
            params![
                update.status,
                update.processing_time,
                update.width,
                update.height,
                update.format,
                update.size_bytes,
                update.thumbnail,
                update.error_msg,
                update.image_id,
            ],
        )?;

        Ok(())
    }

    pub fn set_image_caption(&mut self, caption: &str, image_id: &str) -> anyhow::Result<()> {
        self.conn.execute(
            "UPDATE processed_images SET caption = ?1 WHERE image_id = ?2",
            params![caption, image_id],
        )?;

        Ok(())
    }

    pub fn get_image_data(&self, image_id: &str) -> anyhow::Result<Option<ImageData>> {
        let data = self
            .conn
            .query_row(
                "SELECT row_id, image_id, status, original_name, processed_at,
                        processing_time, width, height, format, size_bytes,
                        thumbnail, caption, error_msg
                 FROM processed_images WHERE image_id = ?1",
                params![image_id],
                map_image_row,
            )
            .optional()?;

        Ok(data)
    }

    pub fn get_image_data_array(&self) -> anyhow::Result<Vec<ImageData>> {
        let mut stmt = self.conn.prepare(
            "SELECT row_id, image_id, status, original_name, processed_at,
                    processing_time, width, height, format, size_bytes,
                    thumbnail, caption, error_msg
             FROM processed_images",
        )?;
        let rows = stmt.query_map([], map_image_row)?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Rows still in `processing` state count towards neither total nor
    /// failed.
    pub fn get_processing_stats(&self) -> anyhow::Result<ProcessingStats> {
        let stats = self.conn.query_row(
            "SELECT
                COALESCE(SUM(IIF(status != 'processing', 1, 0)), 0) AS total,
                COALESCE(SUM(IIF(status == 'failed', 1, 0)), 0) AS failed,
                COALESCE(SUM(processing_time), 0) / 1000 AS total_processing_time_seconds
             FROM processed_images",
            [],
            |row| {
                Ok(ProcessingStats {
                    total: row.get(0)?,
                    failed: row.get(1)?,
                    total_processing_time_seconds: row.get(2)?,
                })
            },
        )?;

        Ok(stats)
    }
}

fn map_image_row(row: &Row) -> rusqlite::Result<ImageData> {
    Ok(ImageData {
        row_id: row.get(0)?,
        image_id: row.get(1)?,
        status: row.get(2)?,
        original_name: row.get(3)?,
        processed_at: row.get(4)?,
        processing_time: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        format: row.get(8)?,
        size_bytes: row.get(9)?,
        thumbnail: row.get(10)?,
        caption: row.get(11)?,
        error_msg: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_update(image_id: &str) -> ProcessedImageUpdate {
        ProcessedImageUpdate {
            image_id: image_id.to_string(),
            status: STATUS_SUCCESS.to_string(),
            processing_time: Some(12.5),
            width: Some(640),
            height: Some(480),
            format: Some("png".to_string()),
            size_bytes: Some(1024),
            thumbnail: Some(image_id.to_string()),
            error_msg: None,
        }
    }

    #[test_log::test]
    fn test_insert_assigns_sequential_ids() {
        let mut library = ImageLibrary::in_memory().expect("open in-memory library");

        assert_eq!(library.insert_image_row("a.png").expect("insert"), "img1");
        assert_eq!(library.insert_image_row("b.jpg").expect("insert"), "img2");

        let data = library
            .get_image_data("img2")
            .expect("get")
            .expect("record exists right after insert");
        assert_eq!(data.status, STATUS_PROCESSING);
        assert_eq!(data.original_name, "b.jpg");
        assert!(data.processed_at.is_some());
        assert!(data.width.is_none());
    }

    #[test_log::test]
    fn test_update_and_caption_round_trip() {
        let mut library = ImageLibrary::in_memory().expect("open in-memory library");
        let image_id = library.insert_image_row("dog.jpg").expect("insert");

        library
            .update_image_data(&success_update(&image_id))
            .expect("update");
        library
            .set_image_caption("a dog on a beach", &image_id)
            .expect("set caption");

        let data = library
            .get_image_data(&image_id)
            .expect("get")
            .expect("record exists");
        assert_eq!(data.status, STATUS_SUCCESS);
        assert_eq!(data.width, Some(640));
        assert_eq!(data.format.as_deref(), Some("png"));
        assert_eq!(data.caption.as_deref(), Some("a dog on a beach"));
        assert!(data.error_msg.is_none());
    }

    #[test_log::test]
    fn test_unknown_id_is_none() {
        let library = ImageLibrary::in_memory().expect("open in-memory library");
        assert!(library.get_image_data("img999").expect("get").is_none());
    }

    #[test_log::test]
    fn test_stats_ignore_in_flight_rows() {
        let mut library = ImageLibrary::in_memory().expect("open in-memory library");

        let empty = library.get_processing_stats().expect("stats");
        assert_eq!(empty.total, 0);
        assert_eq!(empty.failed, 0);
        assert_eq!(empty.total_processing_time_seconds, 0.0);

        let ok_id = library.insert_image_row("ok.png").expect("insert");
        library
            .update_image_data(&success_update(&ok_id))
            .expect("update");

        let failed_id = library.insert_image_row("broken.bin").expect("insert");
        library
            .update_image_data(&ProcessedImageUpdate {
                image_id: failed_id,
                status: STATUS_FAILED.to_string(),
                error_msg: Some("invalid file format".to_string()),
                ..Default::default()
            })
            .expect("update");

        // still processing, must not count
        library.insert_image_row("pending.png").expect("insert");

        let stats = library.get_processing_stats().expect("stats");
        assert_eq!(stats.total, 2);
        assert_eq!(stats.failed, 1);
        assert!((stats.total_processing_time_seconds - 0.0125).abs() < 1e-9);

        let all = library.get_image_data_array().expect("list");
        assert_eq!(all.len(), 3);
    }
}
