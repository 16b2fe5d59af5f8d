//! Cat request payloads.

use cats_core::{ProtocolError, Validate, Violations};
use cats_db::{CatPatch, NewCat};
use serde::Deserialize;

/// Maximum length of a cat's name or breed.
pub const MAX_TEXT_LENGTH: usize = 100;
/// Maximum length of a description.
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// `POST /cats` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCatDto {
    pub name: String,
    pub age: i32,
    pub breed: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateCatDto {
    pub(super) fn into_new_cat(self, internal_notes: String) -> NewCat {
        NewCat {
            name: self.name.trim().to_string(),
            age: self.age,
            breed: self.breed.trim().to_string(),
            description: self.description,
            internal_notes: Some(internal_notes),
        }
    }
}

impl Validate for CreateCatDto {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.required_text("name", &self.name, MAX_TEXT_LENGTH)
            .required_text("breed", &self.breed, MAX_TEXT_LENGTH)
            .optional_text(
                "description",
                self.description.as_deref(),
                MAX_DESCRIPTION_LENGTH,
            );
        v.finish()
    }
}

/// `PATCH /cats/{id}` body. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateCatDto {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub breed: Option<String>,
    pub description: Option<String>,
}

impl From<UpdateCatDto> for CatPatch {
    fn from(dto: UpdateCatDto) -> Self {
        Self {
            name: dto.name.map(|n| n.trim().to_string()),
            age: dto.age,
            breed: dto.breed.map(|b| b.trim().to_string()),
            description: dto.description,
        }
    }
}

impl Validate for UpdateCatDto {
    fn validate(&self) -> Result<(), ProtocolError> {
        let mut v = Violations::new();
        v.optional_text("name", self.name.as_deref(), MAX_TEXT_LENGTH)
            .optional_text("breed", self.breed.as_deref(), MAX_TEXT_LENGTH)
            .optional_text(
                "description",
                self.description.as_deref(),
                MAX_DESCRIPTION_LENGTH,
            );
        v.finish()
    }
}

#[cfg(test)]
mod tests {
    use cats_core::ErrorMessage;

    use super::*;

    #[test]
    fn create_reports_every_blank_field() {
        let dto: CreateCatDto =
            serde_json::from_str(r#"{"name": "", "age": 2, "breed": " "}"#).unwrap();
        let err = dto.validate().unwrap_err();
        assert_eq!(
            err.message(),
            &ErrorMessage::Many(vec![
                "name should not be empty".to_string(),
                "breed should not be empty".to_string(),
            ])
        );
    }

    #[test]
    fn update_accepts_empty_body() {
        let dto: UpdateCatDto = serde_json::from_str("{}").unwrap();
        assert!(dto.validate().is_ok());
        let patch = CatPatch::from(dto);
        assert!(patch.name.is_none() && patch.age.is_none());
    }

    #[test]
    fn update_rejects_blank_name() {
        let dto = UpdateCatDto {
            name: Some(String::new()),
            ..UpdateCatDto::default()
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn names_are_trimmed() {
        let dto = CreateCatDto {
            name: " Tom ".to_string(),
            age: 1,
            breed: "Tabby".to_string(),
            description: None,
        };
        let cat = dto.into_new_cat("notes".to_string());
        assert_eq!(cat.name, "Tom");
        assert_eq!(cat.internal_notes.as_deref(), Some("notes"));
    }
}
