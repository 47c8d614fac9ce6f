//! MQTT topic construction, parsing, and name normalization.
//!
//! Topics follow the pattern:
//!
//! ```text
//! <prefix>/<normalized-name>        product state (retained)
//! <prefix>/<name>/set               incoming commands
//! <prefix>/@/status                 bridge status (retained)
//! ```

/// Canonical normalization of a product display name into a topic segment.
///
/// Lower-cases the name and collapses every run of non-alphanumeric
/// characters into a single `_`, trimming at the ends. The same function is
/// used on the publish path and the command-resolution path, so the mapping
/// round-trips: `normalize_name("Kitchen Blind") == "kitchen_blind"` and a
/// command on `kitchen_blind` resolves back to the same product.
///
/// Idempotent: `normalize_name(normalize_name(x)) == normalize_name(x)`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    out
}

/// Undo the topic-segment encoding of a command's name fragment.
///
/// Incoming `/set` topics carry the product name with underscores for
/// spaces; lookups normalize both sides, so this substitution exists for
/// fidelity with names that genuinely contain spaces.
pub fn decode_command_name(segment: &str) -> String {
    segment.replace('_', " ")
}

/// Extract the raw name segment from a command topic.
///
/// Returns the second-to-last segment of any topic ending in `/set`,
/// or `None` for anything else.
pub fn command_name(topic: &str) -> Option<&str> {
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() < 3 || *segments.last()? != "set" {
        return None;
    }
    let name = segments[segments.len() - 2];
    (!name.is_empty()).then_some(name)
}

/// Builder for the bridge's topics under a fixed prefix.
#[derive(Debug, Clone)]
pub struct TopicBuilder {
    prefix: String,
}

impl TopicBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// State topic for a product: `<prefix>/<normalized-name>`.
    pub fn state_topic(&self, product_name: &str) -> String {
        format!("{}/{}", self.prefix, normalize_name(product_name))
    }

    /// Wildcard subscription pattern for commands: `<prefix>/+/set`.
    pub fn command_pattern(&self) -> String {
        format!("{}/+/set", self.prefix)
    }

    /// Admin status topic: `<prefix>/@/status`.
    pub fn status_topic(&self) -> String {
        format!("{}/@/status", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_name("Kitchen Blind"), "kitchen_blind");
        assert_eq!(normalize_name("Living Room"), "living_room");
        assert_eq!(normalize_name("Office"), "office");
    }

    #[test]
    fn test_normalize_collapses_separator_runs() {
        assert_eq!(normalize_name("Guest  Room - West"), "guest_room_west");
        assert_eq!(normalize_name("  Attic  "), "attic");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for name in ["Kitchen Blind", "Guest  Room - West", "skylight_3", "Büro"] {
            let once = normalize_name(name);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn test_normalize_roundtrips_through_command_encoding() {
        let topic_segment = normalize_name("Kitchen Blind");
        let decoded = decode_command_name(&topic_segment);
        assert_eq!(normalize_name(&decoded), normalize_name("Kitchen Blind"));
    }

    #[test]
    fn test_command_name_parsing() {
        assert_eq!(command_name("velux/kitchen_blind/set"), Some("kitchen_blind"));
        assert_eq!(
            command_name("home/velux/kitchen_blind/set"),
            Some("kitchen_blind")
        );
        assert_eq!(command_name("velux/kitchen_blind"), None);
        assert_eq!(command_name("velux/set"), None);
        assert_eq!(command_name("velux//set"), None);
    }

    #[test]
    fn test_topic_builder() {
        let topics = TopicBuilder::new("velux");
        assert_eq!(topics.state_topic("Kitchen Blind"), "velux/kitchen_blind");
        assert_eq!(topics.command_pattern(), "velux/+/set");
        assert_eq!(topics.status_topic(), "velux/@/status");
    }
}
