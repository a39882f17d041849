//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// A PDF with one page per entry, each page showing that text
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let stream = Stream::new(dictionary! {}, content.encode().unwrap());
            let content_id = doc.add_object(stream);
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            })
            .into()
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A Semantic Scholar search item
pub fn semantic_item(id: &str, title: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "paperId": id,
        "title": title,
        "abstract": "An abstract.",
        "year": 2021,
        "citationCount": 3,
        "authors": [{ "name": "Ada Lovelace" }],
        "externalIds": { "DOI": format!("10.1000/{}", id) },
        "url": format!("https://www.semanticscholar.org/paper/{}", id),
        "openAccessPdf": { "url": format!("https://example.org/{}.pdf", id) }
    })
}

/// A bioRxiv details-API item
pub fn biorxiv_item(n: usize) -> serde_json::Value {
    serde_json::json!({
        "doi": format!("10.1101/2024.01.{:03}", n),
        "title": format!("Preprint {}", n),
        "authors": "Smith, J.; Doe, A.",
        "date": "2024-01-15",
        "version": "1",
        "category": "neuroscience",
        "abstract": "Abstract text.",
        "server": "biorxiv"
    })
}
