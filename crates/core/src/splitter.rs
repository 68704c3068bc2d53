use crate::error::IngestError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use tempfile::NamedTempFile;

pub fn load_pdf(path: &Path) -> Result<Document, IngestError> {
    if !path.is_file() {
        return Err(IngestError::PdfNotFound(path.to_path_buf()));
    }
    Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))
}

pub fn page_count(document: &Document) -> u32 {
    document.get_pages().len() as u32
}

/// Partitions `0..total_pages` into consecutive `[start, end)` ranges of
/// `batch_size` pages; the last range is clipped.
pub fn batch_ranges(total_pages: u32, batch_size: u32) -> Result<Vec<Range<u32>>, IngestError> {
    if batch_size == 0 {
        return Err(IngestError::InvalidArgument(
            "batch size must be at least one page".to_string(),
        ));
    }

    Ok((0..total_pages)
        .step_by(batch_size as usize)
        .map(|start| start..start.saturating_add(batch_size).min(total_pages))
        .collect())
}

/// Writes the pages in `pages` (0-based, clipped to the document) to a new
/// temporary PDF. The file is removed when the returned handle is dropped.
pub fn split_pdf(document: &Document, pages: Range<u32>) -> Result<NamedTempFile, IngestError> {
    let total = page_count(document);
    let end = pages.end.min(total);
    if pages.start >= end {
        return Err(IngestError::InvalidArgument(format!(
            "page range {}..{} is empty for a {total}-page document",
            pages.start, pages.end
        )));
    }

    let mut batch = copy_pages(document, pages.start..end)?;

    let mut file = tempfile::Builder::new()
        .prefix("pdf-qa-batch-")
        .suffix(".pdf")
        .tempfile()?;
    batch
        .save_to(file.as_file_mut())
        .map_err(|error| IngestError::PdfWrite(error.to_string()))?;
    file.as_file_mut().flush()?;

    Ok(file)
}

// Builds a document from the kept pages and the objects reachable from them,
// without cloning the rest of the source.
fn copy_pages(document: &Document, pages: Range<u32>) -> Result<Document, IngestError> {
    let mut batch = Document::with_version(document.version.clone());
    batch.max_id = document.max_id;
    let pages_id = batch.new_object_id();

    let page_ids = document
        .get_pages()
        .range(pages.start + 1..=pages.end)
        .map(|(_, id)| *id)
        .collect::<Vec<_>>();

    let mut pending = Vec::new();
    for page_id in &page_ids {
        let mut page = document
            .get_dictionary(*page_id)
            .map_err(|error| IngestError::PdfParse(error.to_string()))?
            .clone();
        for key in INHERITED_PAGE_KEYS {
            if !page.has(key) {
                if let Some(value) = inherited_attribute(document, &page, key) {
                    page.set(key.to_vec(), value);
                }
            }
        }
        page.set("Parent", pages_id);

        push_dictionary_references(&page, &mut pending);
        batch.objects.insert(*page_id, Object::Dictionary(page));
    }

    while let Some(id) = pending.pop() {
        if batch.objects.contains_key(&id) {
            continue;
        }
        // Dangling references are left dangling.
        let Ok(object) = document.get_object(id) else {
            continue;
        };
        push_references(object, &mut pending);
        batch.objects.insert(id, object.clone());
    }

    let kids = page_ids
        .iter()
        .map(|id| Object::Reference(*id))
        .collect::<Vec<_>>();
    batch.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = batch.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    batch.trailer.set("Root", catalog_id);

    Ok(batch)
}

const INHERITED_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

fn inherited_attribute(document: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = document.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn push_references(object: &Object, pending: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => pending.push(*id),
        Object::Array(items) => {
            for item in items {
                push_references(item, pending);
            }
        }
        Object::Dictionary(dict) => push_dictionary_references(dict, pending),
        Object::Stream(stream) => push_dictionary_references(&stream.dict, pending),
        _ => {}
    }
}

// `Parent` links lead back into the source page tree.
fn push_dictionary_references(dict: &Dictionary, pending: &mut Vec<ObjectId>) {
    for (key, value) in dict.iter() {
        if key.as_slice() != b"Parent" {
            push_references(value, pending);
        }
    }
}

pub fn split_pdf_file(path: &Path, pages: Range<u32>) -> Result<NamedTempFile, IngestError> {
    let document = load_pdf(path)?;
    split_pdf(&document, pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_document, write_sample_pdf};
    use tempfile::tempdir;

    #[test]
    fn hundred_twenty_pages_make_three_batches() {
        let ranges = batch_ranges(120, 50).unwrap();
        assert_eq!(ranges, vec![0..50, 50..100, 100..120]);
    }

    #[test]
    fn batches_cover_every_page_exactly_once() {
        for total in [0u32, 1, 49, 50, 51, 99, 100, 101, 257] {
            for size in [1u32, 7, 50, 300] {
                let ranges = batch_ranges(total, size).unwrap();
                let covered: Vec<u32> = ranges.iter().flat_map(|range| range.clone()).collect();
                assert_eq!(covered, (0..total).collect::<Vec<_>>());
                assert!(ranges.iter().all(|range| range.end - range.start <= size));
            }
        }
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(
            batch_ranges(10, 0),
            Err(IngestError::InvalidArgument(_))
        ));
    }

    #[test]
    fn split_keeps_only_requested_pages() -> Result<(), Box<dyn std::error::Error>> {
        let document = sample_document(&["one", "two", "three", "four", "five"]);

        let batch = split_pdf(&document, 1..3)?;
        let reloaded = Document::load(batch.path())?;
        assert_eq!(page_count(&reloaded), 2);
        Ok(())
    }

    #[test]
    fn split_copies_only_the_kept_pages() -> Result<(), Box<dyn std::error::Error>> {
        let document = sample_document(&["one", "two", "three", "four", "five"]);

        let batch = split_pdf(&document, 1..3)?;
        let reloaded = Document::load(batch.path())?;

        assert_eq!(page_count(&reloaded), 2);
        assert!(reloaded.objects.len() < document.objects.len());
        let text = reloaded.extract_text(&[1, 2])?;
        assert!(text.contains("two") && text.contains("three"));
        assert!(!text.contains("one") && !text.contains("four"));
        Ok(())
    }

    #[test]
    fn split_pages_keep_inherited_resources() -> Result<(), Box<dyn std::error::Error>> {
        let document = sample_document(&["alpha", "beta"]);

        let batch = split_pdf(&document, 1..2)?;
        let reloaded = Document::load(batch.path())?;
        let (_, page_id) = reloaded.get_pages().into_iter().next().ok_or("no pages")?;
        let page = reloaded.get_dictionary(page_id)?;

        assert!(page.has(b"Resources"));
        assert!(page.has(b"MediaBox"));
        Ok(())
    }

    #[test]
    fn split_clips_range_to_document_length() -> Result<(), Box<dyn std::error::Error>> {
        let document = sample_document(&["one", "two", "three"]);

        let batch = split_pdf(&document, 2..50)?;
        let reloaded = Document::load(batch.path())?;
        assert_eq!(page_count(&reloaded), 1);
        Ok(())
    }

    #[test]
    fn split_rejects_range_past_the_end() {
        let document = sample_document(&["one"]);
        assert!(matches!(
            split_pdf(&document, 3..5),
            Err(IngestError::InvalidArgument(_))
        ));
    }

    #[test]
    fn temporary_batch_is_removed_on_drop() -> Result<(), Box<dyn std::error::Error>> {
        let document = sample_document(&["one", "two"]);
        let batch = split_pdf(&document, 0..1)?;
        let path = batch.path().to_path_buf();
        assert!(path.exists());

        drop(batch);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn missing_pdf_is_not_found() {
        let result = load_pdf(Path::new("/nonexistent/input.pdf"));
        assert!(matches!(result, Err(IngestError::PdfNotFound(_))));
    }

    #[test]
    fn split_from_file_path() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("source.pdf");
        write_sample_pdf(&path, &["a", "b", "c", "d"])?;

        let batch = split_pdf_file(&path, 0..3)?;
        assert_eq!(page_count(&Document::load(batch.path())?), 3);
        Ok(())
    }
}
