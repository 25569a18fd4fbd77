// Routine comment directives
//
// A routine comment may carry one `key=value` directive per line. Anything
// that is not a recognized directive is ordinary documentation and is skipped.

/// Accepted spellings of the connection selection directive
const CONNECTION_KEYS: [&str; 3] = ["connection_name", "connection", "connection-name"];
const METHOD_KEY: &str = "method";
const PATH_KEY: &str = "path";

/// Canonical directive keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKey {
    Connection,
    Method,
    Path,
}

impl DirectiveKey {
    /// Maps a raw key onto its canonical form. Keys are case-sensitive.
    pub fn from_raw(raw: &str) -> Option<Self> {
        if CONNECTION_KEYS.contains(&raw) {
            Some(Self::Connection)
        } else if raw == METHOD_KEY {
            Some(Self::Method)
        } else if raw == PATH_KEY {
            Some(Self::Path)
        } else {
            None
        }
    }
}

/// Directives extracted from one routine comment.
/// An absent field means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    pub connection: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
}

impl Directives {
    /// Connection name the routine asks for; empty means the default connection
    pub fn connection_name(&self) -> &str {
        self.connection.as_deref().unwrap_or("")
    }

    fn apply(&mut self, key: DirectiveKey, value: &str) {
        // Empty values reset the directive back to its default
        let value: Option<String> = (!value.is_empty()).then(|| value.to_owned());

        match key {
            DirectiveKey::Connection => self.connection = value,
            DirectiveKey::Method => self.method = value,
            DirectiveKey::Path => self.path = value,
        }
    }
}

/// Parses a routine comment into directives.
///
/// Each line is inspected independently for `key=value`; the key and value
/// are trimmed of surrounding whitespace. Later lines override earlier ones.
pub fn parse(text: Option<&str>) -> Directives {
    let mut directives: Directives = Directives::default();

    let Some(text) = text else {
        return directives;
    };

    for line in text.lines() {
        let Some((raw_key, raw_value)) = line.split_once('=') else {
            continue;
        };

        if let Some(key) = DirectiveKey::from_raw(raw_key.trim()) {
            directives.apply(key, raw_value.trim());
        }
    }

    directives
}
