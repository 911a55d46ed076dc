use std::cmp::Ordering;
use std::fmt;

/// A Minecraft version string ("1.20.1") with numeric ordering.
///
/// File version lists mix real game versions with loader-ish tags
/// ("Fabric", "Client"); only tokens starting with an ASCII digit are
/// treated as game versions, and only numeric dot-components take part
/// in comparison.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GameVersion {
    raw: String,
    components: Vec<u64>,
}

impl GameVersion {
    /// Parse a version token. Returns `None` for tokens that do not
    /// start with a digit (loader names, side tags, snapshot ids).
    pub fn parse(raw: &str) -> Option<Self> {
        if !raw.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return None;
        }
        let components = raw
            .split('.')
            .map_while(|part| {
                let digits: String =
                    part.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse::<u64>().ok()
            })
            .collect();
        Some(Self {
            raw: raw.to_string(),
            components,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Ord for GameVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components
            .cmp(&other.components)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for GameVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
