use crate::error::QueryError;
use crate::generation::Generator;
use crate::models::GenerationParams;
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const MANUAL_PAGES: [&str; 3] = [
    "The hydraulic pump must be inspected every week for leaks around the seals, and the operator records the pressure reading in the maintenance log before each shift begins.",
    "Replace the air filter element every six months or sooner when the cabin warning light reports a restricted flow through the intake housing of the compressor.",
    "The cafeteria on the second floor serves soup and bread at noon, and visitors must sign in at the front desk before entering any of the production areas.",
];

#[derive(Default, Clone)]
pub struct RecordingGenerator {
    pub prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, QueryError> {
        assert_eq!(params.temperature, 0.0);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("the answer".to_string())
    }
}

pub fn sample_document(pages: &[&str]) -> Document {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let encoded = content.encode().expect("content stream encodes");
        let content_id = document.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);
    document
}

pub fn write_sample_pdf(path: &Path, pages: &[&str]) -> std::io::Result<()> {
    let mut document = sample_document(pages);
    document
        .save(path)
        .map_err(|error| std::io::Error::other(error.to_string()))?;
    Ok(())
}
