//! PDF merge – concatenates the pages of several PDFs into one document.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::ConvertError;

/// Concatenate `pdfs` in order.
///
/// A single input is returned unchanged; an empty list is
/// [`ConvertError::NothingSelected`]. Outlines of the inputs are dropped.
pub fn merge_pdfs(pdfs: &[&[u8]]) -> Result<Vec<u8>, ConvertError> {
    match pdfs {
        [] => return Err(ConvertError::NothingSelected),
        [single] => return Ok(single.to_vec()),
        _ => {}
    }

    let mut merged = Document::with_version("1.5");
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut catalog: Option<(ObjectId, Dictionary)> = None;
    let mut page_tree: Option<(ObjectId, Dictionary)> = None;
    let mut max_id = 1;

    for (idx, bytes) in pdfs.iter().enumerate() {
        let mut doc = Document::load_mem(bytes)?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, page_id) in doc.get_pages() {
            let page = doc.get_object(page_id)?.as_dict()?.clone();
            pages.push((page_id, page));
        }
        log::debug!("merge: input {} contributes {} page(s)", idx + 1, doc.get_pages().len());

        for (id, object) in doc.objects {
            match type_of(&object) {
                Some(b"Catalog") => {
                    if catalog.is_none() {
                        catalog = Some((id, object.as_dict()?.clone()));
                    }
                }
                Some(b"Pages") => {
                    let dict = object.as_dict()?.clone();
                    page_tree = Some(match page_tree.take() {
                        Some((root, mut acc)) => {
                            acc.extend(&dict);
                            (root, acc)
                        }
                        None => (id, dict),
                    });
                }
                Some(b"Page") | Some(b"Outlines") | Some(b"Outline") => {}
                _ => {
                    merged.objects.insert(id, object);
                }
            }
        }
    }

    let (catalog_id, mut catalog) = catalog
        .ok_or_else(|| ConvertError::MalformedInput("no document catalog in merge input".into()))?;
    let (tree_id, mut tree) = page_tree
        .ok_or_else(|| ConvertError::MalformedInput("no page tree in merge input".into()))?;

    let count = pages.len() as i64;
    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    for (id, mut page) in pages {
        page.set("Parent", Object::Reference(tree_id));
        merged.objects.insert(id, Object::Dictionary(page));
    }

    tree.set("Count", count);
    tree.set("Kids", kids);
    tree.remove(b"Parent");
    merged.objects.insert(tree_id, Object::Dictionary(tree));

    catalog.set("Pages", Object::Reference(tree_id));
    catalog.remove(b"Outlines");
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));

    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();

    let mut out = Vec::new();
    merged.save_to(&mut out)?;
    log::info!("merged {} PDFs into {count} page(s)", pdfs.len());
    Ok(out)
}

/// Number of pages in a PDF.
pub fn page_count(pdf: &[u8]) -> Result<usize, ConvertError> {
    Ok(Document::load_mem(pdf)?.get_pages().len())
}

fn type_of(object: &Object) -> Option<&[u8]> {
    match object.as_dict().ok()?.get(b"Type").ok()? {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::generate_pdf_from_html;

    #[test]
    fn empty_input_is_nothing_selected() {
        assert!(matches!(merge_pdfs(&[]), Err(ConvertError::NothingSelected)));
    }

    #[test]
    fn single_input_untouched() {
        let pdf = b"%PDF-1.4 not parsed".to_vec();
        assert_eq!(merge_pdfs(&[pdf.as_slice()]).unwrap(), pdf);
    }

    #[test]
    fn pages_are_concatenated() {
        let a = generate_pdf_from_html("<h1>A</h1>").unwrap();
        let b = generate_pdf_from_html("<h1>B</h1>").unwrap();
        let merged = merge_pdfs(&[a.as_slice(), b.as_slice(), a.as_slice()]).unwrap();
        assert_eq!(page_count(&merged).unwrap(), 3);
    }

    #[test]
    fn garbage_is_a_pdf_error() {
        let err = merge_pdfs(&[&b"nope"[..], &b"nada"[..]]).unwrap_err();
        assert!(matches!(err, ConvertError::Pdf(_)));
    }
}
