//! Text field descriptions

/// Immutable description of one editable text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextFieldDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub min_length: usize,
    pub max_length: usize,
    /// UI-level pattern, shown to clients
    pub pattern: &'static str,
    pub initial_value: Option<&'static str>,
}

pub const REMOTE_ID_TAG_FIELD: TextFieldDescription = TextFieldDescription {
    key: "remote_id_tag",
    name: "Remote Id Tag",
    min_length: 1,
    max_length: 20,
    pattern: r"^[A-Z0-9]+$",
    initial_value: None,
};

/// Every text field attached per charge point
pub const TEXT_FIELDS: &[TextFieldDescription] = &[REMOTE_ID_TAG_FIELD];

impl TextFieldDescription {
    /// `text.{cpid}_{key}`
    pub fn entity_id(&self, charge_point_id: &str) -> String {
        format!("text.{}_{}", charge_point_id, self.key)
    }

    /// Whether `value` satisfies the UI constraints (length and `^[A-Z0-9]+$`).
    ///
    /// The backend is more lenient; this only guards the editable surface.
    pub fn accepts(&self, value: &str) -> bool {
        let len = value.chars().count();
        (self.min_length..=self.max_length).contains(&len)
            && value
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    }
}
