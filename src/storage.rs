use crate::error::Result;
use crate::models::{ChapterLocation, OutputFormat};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{ColorType, ImageFormat};
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::FileOptions;

pub struct StorageManager {
    destination_path: PathBuf,
}

impl StorageManager {
    pub fn new(destination_path: impl Into<PathBuf>) -> Self {
        Self {
            destination_path: destination_path.into(),
        }
    }

    /// `<destination>/<manga_name>/<chapter_number>`
    pub fn chapter_path(&self, location: &ChapterLocation) -> PathBuf {
        location.chapter_dir(&self.destination_path)
    }

    /// `<chapter_path>/<chapter_number>.<ext>`
    pub fn archive_path(&self, location: &ChapterLocation, format: OutputFormat) -> PathBuf {
        self.chapter_path(location)
            .join(format!("{}.{}", location.chapter_number, format.extension()))
    }

    /// Packs `files` in the given order. `Jpg` produces nothing.
    pub fn create_archive(
        &self,
        location: &ChapterLocation,
        format: OutputFormat,
        files: &[PathBuf],
    ) -> Result<Option<PathBuf>> {
        let dir = self.chapter_path(location);
        let output = self.archive_path(location, format);

        match format {
            OutputFormat::Jpg => return Ok(None),
            OutputFormat::Pdf => create_pdf(&dir, &output, files)?,
            OutputFormat::Cbz => create_cbz(&dir, &output, files)?,
        }

        Ok(Some(output))
    }

    pub async fn remove_images(&self, files: &[PathBuf]) -> Result<()> {
        for file in files {
            tokio::fs::remove_file(file).await?;
            debug!("Removed image: {:?}", file);
        }
        Ok(())
    }
}

/// Creates `dir` and its parents. An existing directory is not an error.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Archive entry name: the path relative to `dir`, or the bare file name.
fn entry_name(dir: &Path, file: &Path) -> String {
    match file.strip_prefix(dir) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string_lossy().into_owned()),
    }
}

/// Writes a CBZ (plain zip) whose entries follow the order of `files`.
pub fn create_cbz(dir: &Path, output_path: &Path, files: &[PathBuf]) -> Result<()> {
    info!("Creating CBZ archive: {:?}", output_path);

    let file = File::create(output_path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for path in files {
        zip.start_file(entry_name(dir, path), options)?;
        let content = std::fs::read(path)?;
        zip.write_all(&content)?;
    }

    zip.finish()?;
    info!("Created CBZ archive with {} pages: {:?}", files.len(), output_path);
    Ok(())
}

/// Writes a PDF with one page per image, each page sized to its image.
pub fn create_pdf(dir: &Path, output_path: &Path, files: &[PathBuf]) -> Result<()> {
    use pdf_writer::Finish;

    info!("Creating PDF: {:?} from {:?}", output_path, dir);

    let mut pdf = Pdf::new();
    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let mut next_id = 3;
    let mut alloc = || {
        let id = Ref::new(next_id);
        next_id += 1;
        id
    };

    let mut page_ids = Vec::with_capacity(files.len());
    for (index, path) in files.iter().enumerate() {
        let page_id = alloc();
        let image_id = alloc();
        let content_id = alloc();
        let image_name = format!("Im{}", index + 1);

        let data = std::fs::read(path)?;
        let format = image::guess_format(&data)?;
        let dynamic = image::load_from_memory(&data)?;
        let (width, height) = (dynamic.width(), dynamic.height());

        // Only 3-component JPEG data can be embedded as-is under DeviceRGB.
        let passthrough = format == ImageFormat::Jpeg
            && dynamic.color() == ColorType::Rgb8
            && jpeg_components(&data) == Some(3);
        let (filter, encoded) = if passthrough {
            (Filter::DctDecode, data)
        } else {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(dynamic.to_rgb8().as_raw())?;
            (Filter::FlateDecode, encoder.finish()?)
        };

        debug!("PDF page {}: {:?} {}x{} {:?}", index + 1, path, width, height, format);

        let rect = Rect::new(0.0, 0.0, width as f32, height as f32);
        let mut page = pdf.page(page_id);
        page.media_box(rect);
        page.parent(page_tree_id);
        page.contents(content_id);
        page.resources().x_objects().pair(Name(image_name.as_bytes()), image_id);
        page.finish();

        let mut image = pdf.image_xobject(image_id, &encoded);
        image.filter(filter);
        image.width(width as i32);
        image.height(height as i32);
        image.color_space().device_rgb();
        image.bits_per_component(8);
        image.finish();

        let mut content = Content::new();
        content.save_state();
        content.transform([width as f32, 0.0, 0.0, height as f32, 0.0, 0.0]);
        content.x_object(Name(image_name.as_bytes()));
        content.restore_state();
        pdf.stream(content_id, &content.finish());

        page_ids.push(page_id);
    }

    if page_ids.is_empty() {
        warn!("Creating PDF without pages: {:?}", output_path);
    }

    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id)
        .count(page_ids.len() as i32)
        .kids(page_ids);

    std::fs::write(output_path, pdf.finish())?;
    info!("Created PDF with {} pages: {:?}", files.len(), output_path);
    Ok(())
}

/// Component count declared by the first SOF segment of a JPEG stream.
/// CMYK and YCCK files report 4 even when decoded as RGB.
fn jpeg_components(data: &[u8]) -> Option<u8> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            return data.get(pos + 9).copied();
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        pos += 2 + length;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Read;
    use tempfile::TempDir;

    fn write_png(path: &Path, shade: u8) {
        RgbImage::from_pixel(20, 30, Rgb([shade, shade, shade]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    fn location() -> ChapterLocation {
        ChapterLocation {
            manga_name: "one-piece".to_string(),
            chapter_number: "1000".to_string(),
        }
    }

    #[test]
    fn cbz_keeps_given_order() {
        let dir = TempDir::new().unwrap();
        let names = ["03.png", "01.png", "02.png"];
        let files: Vec<PathBuf> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let path = dir.path().join(name);
                write_png(&path, i as u8 * 40);
                path
            })
            .collect();

        let output = dir.path().join("1000.cbz");
        create_cbz(dir.path(), &output, &files).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let entries: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(entries, names);

        let mut first = Vec::new();
        archive.by_index(0).unwrap().read_to_end(&mut first).unwrap();
        assert_eq!(first, std::fs::read(&files[0]).unwrap());
    }

    #[test]
    fn pdf_has_one_page_per_image() {
        let dir = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("{:02}.png", i));
                write_png(&path, i * 60);
                path
            })
            .collect();

        let output = dir.path().join("1000.pdf");
        create_pdf(dir.path(), &output, &files).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count 3"));
        assert_eq!(text.matches("/Subtype /Image").count(), 3);
    }

    fn write_jpeg(path: &Path) {
        RgbImage::from_pixel(24, 16, Rgb([200, 120, 40]))
            .save_with_format(path, ImageFormat::Jpeg)
            .unwrap();
    }

    #[test]
    fn pdf_embeds_rgb_jpeg_directly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("01.jpg");
        write_jpeg(&path);

        let output = dir.path().join("1000.pdf");
        create_pdf(dir.path(), &output, &[path]).unwrap();

        let text = String::from_utf8_lossy(&std::fs::read(&output).unwrap()).into_owned();
        assert!(text.contains("/DCTDecode"));
        assert!(!text.contains("/FlateDecode"));
    }

    #[test]
    fn reads_jpeg_component_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("01.jpg");
        write_jpeg(&path);
        assert_eq!(jpeg_components(&std::fs::read(&path).unwrap()), Some(3));

        // SOI, APP14 (Adobe, 2 bytes of payload), SOF0 with 4 components
        let cmyk = [
            0xFF, 0xD8, 0xFF, 0xEE, 0x00, 0x04, 0x00, 0x00, 0xFF, 0xC0, 0x00, 0x14, 0x08, 0x00, 0x10,
            0x00, 0x10, 0x04,
        ];
        assert_eq!(jpeg_components(&cmyk), Some(4));
        assert_eq!(jpeg_components(b"\x89PNG"), None);
    }

    #[test]
    fn archive_paths_follow_chapter_layout() {
        let storage = StorageManager::new("/data/mangas");
        assert_eq!(
            storage.archive_path(&location(), OutputFormat::Cbz),
            Path::new("/data/mangas/one-piece/1000/1000.cbz")
        );
        assert_eq!(
            storage.create_archive(&location(), OutputFormat::Jpg, &[]).unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn ensure_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("one-piece").join("1000");

        ensure_dir(&target).await.unwrap();
        ensure_dir(&target).await.unwrap();
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn ensure_dir_fails_on_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("taken");
        std::fs::write(&target, b"x").unwrap();

        assert!(ensure_dir(&target).await.is_err());
    }
}
