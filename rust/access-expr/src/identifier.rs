//! `Identifier` — up to three dotted/banged name segments
//! (`collection!object.property`).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Identifier {
    pub collection: Option<String>,
    pub object: Option<String>,
    pub property: Option<String>,
}

impl Identifier {
    pub fn simple(name: impl Into<String>) -> Self {
        Identifier {
            collection: None,
            object: Some(name.into()),
            property: None,
        }
    }

    pub fn from_segments(mut segments: Vec<String>) -> Option<Self> {
        match segments.len() {
            0 => None,
            1 => Some(Identifier::simple(segments.remove(0))),
            2 => {
                let property = segments.remove(1);
                let object = segments.remove(0);
                Some(Identifier {
                    collection: None,
                    object: Some(object),
                    property: Some(property),
                })
            }
            _ => {
                let property = segments.remove(2);
                let object = segments.remove(1);
                let collection = segments.remove(0);
                Some(Identifier {
                    collection: Some(collection),
                    object: Some(object),
                    property: Some(property),
                })
            }
        }
    }

    /// Best-effort single name a host can use as a column/field lookup key
    /// when it does not care about the full dotted path.
    pub fn innermost(&self) -> &str {
        self.property
            .as_deref()
            .or(self.object.as_deref())
            .or(self.collection.as_deref())
            .unwrap_or("")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if let Some(c) = &self.collection {
            write!(f, "{}", c)?;
            first = false;
        }
        if let Some(o) = &self.object {
            if !first {
                write!(f, "!")?;
            }
            write!(f, "{}", o)?;
            first = false;
        }
        if let Some(p) = &self.property {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", p)?;
        }
        Ok(())
    }
}
