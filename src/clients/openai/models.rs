use std::fmt;

/// Models the cascades know by name. Anything else set through the environment
/// is carried verbatim as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenAIModel {
    Gpt4o,
    Gpt4oMini,
    Gpt35Turbo,
    Whisper1,
    Custom(String),
}

impl OpenAIModel {
    pub fn id(&self) -> &str {
        match self {
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
            Self::Gpt35Turbo => "gpt-3.5-turbo",
            Self::Whisper1 => "whisper-1",
            Self::Custom(id) => id,
        }
    }

    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        match id.trim() {
            "gpt-4o" => Self::Gpt4o,
            "gpt-4o-mini" => Self::Gpt4oMini,
            "gpt-3.5-turbo" => Self::Gpt35Turbo,
            "whisper-1" => Self::Whisper1,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Whether image parts can be sent to this model. Custom ids are assumed capable.
    pub fn accepts_images(&self) -> bool {
        !matches!(self, Self::Gpt35Turbo | Self::Whisper1)
    }
}

impl fmt::Display for OpenAIModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_map_to_variants() {
        for model in [OpenAIModel::Gpt4o, OpenAIModel::Gpt35Turbo, OpenAIModel::Whisper1] {
            assert_eq!(OpenAIModel::from_id(model.id()), model);
        }
        assert_eq!(OpenAIModel::from_id(" gpt-4o-mini "), OpenAIModel::Gpt4oMini);
        assert_eq!(OpenAIModel::from_id("ft:gpt-4o:skolan").id(), "ft:gpt-4o:skolan");
    }

    #[test]
    fn text_only_models_reject_images() {
        assert!(OpenAIModel::Gpt4oMini.accepts_images());
        assert!(!OpenAIModel::Gpt35Turbo.accepts_images());
        assert!(OpenAIModel::Custom("llava".into()).accepts_images());
    }
}
