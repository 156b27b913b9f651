//! In-memory PDF documents for tests.

use crate::PdfEngineError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixturePage {
    pub width: i64,
    pub height: i64,
    pub rotate: i64,
}

/// A document with one unrotated page per `(width, height)` pair, in points.
pub fn pdf_with_pages(sizes: &[(i64, i64)]) -> Result<Vec<u8>, PdfEngineError> {
    let pages: Vec<FixturePage> = sizes
        .iter()
        .map(|&(width, height)| FixturePage { width, height, rotate: 0 })
        .collect();
    pdf_from_pages(&pages)
}

pub fn pdf_from_pages(pages: &[FixturePage]) -> Result<Vec<u8>, PdfEngineError> {
    build(pages.len(), None, |page_index| {
        let page = pages[page_index];
        let mut dict = dictionary! {
            "MediaBox" => vec![0.into(), 0.into(), page.width.into(), page.height.into()],
        };
        if page.rotate != 0 {
            dict.set("Rotate", page.rotate);
        }
        dict
    })
}

/// `page_count` pages that carry no `/MediaBox` of their own; the page tree
/// root declares `size` for all of them.
pub fn pdf_with_inherited_media_box(page_count: usize, size: (i64, i64)) -> Result<Vec<u8>, PdfEngineError> {
    build(page_count, Some(size), |_| Dictionary::new())
}

fn build<F>(page_count: usize, root_media_box: Option<(i64, i64)>, page_dict: F) -> Result<Vec<u8>, PdfEngineError>
where
    F: Fn(usize) -> Dictionary,
{
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();

    let kids: Vec<Object> = (0..page_count)
        .map(|index| {
            let mut dict = page_dict(index);
            dict.set("Type", "Page");
            dict.set("Parent", pages_id);
            doc.add_object(dict).into()
        })
        .collect();

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
    };
    if let Some((width, height)) = root_media_box {
        pages.set("MediaBox", vec![0.into(), 0.into(), width.into(), height.into()]);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}
