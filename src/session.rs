//! Per-file parse state shared by every schema attempt: the host appender,
//! an optional host-supplied location, and the location lookup cache.

use std::collections::HashMap;

use log::debug;
use uuid::Uuid;

use crate::{
    appender::FieldDataAppender,
    domain::LocationInfo,
    error::{MappingError, Result},
};

pub struct ParseSession<'a> {
    appender: &'a mut dyn FieldDataAppender,
    fixed_location: Option<LocationInfo>,
    known_locations: HashMap<String, LocationInfo>,
}

impl<'a> ParseSession<'a> {
    pub fn new(appender: &'a mut dyn FieldDataAppender, fixed_location: Option<LocationInfo>) -> Self {
        Self {
            appender,
            fixed_location,
            known_locations: HashMap::new(),
        }
    }

    pub fn fixed_location(&self) -> Option<&LocationInfo> {
        self.fixed_location.as_ref()
    }

    pub fn appender(&mut self) -> &mut dyn FieldDataAppender {
        &mut *self.appender
    }

    /// Looks a location up by unique id (when the text is a UUID) or by
    /// identifier, caching the answer for the rest of the file.
    pub fn resolve_location(&mut self, text: &str) -> Result<LocationInfo> {
        let key = text.trim();
        if let Some(known) = self.known_locations.get(key) {
            return Ok(known.clone());
        }
        let found = match Uuid::parse_str(key) {
            Ok(unique_id) => self.appender.location_by_unique_id(unique_id)?,
            Err(_) => self.appender.location_by_identifier(key)?,
        };
        let location =
            found.ok_or_else(|| MappingError::Location(format!("Unknown location '{key}'")))?;
        debug!("Resolved location '{key}' to {}", location.unique_id);
        self.known_locations.insert(key.to_string(), location.clone());
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appender::CollectingAppender;

    #[test]
    fn identifiers_and_unique_ids_resolve_to_the_same_location() {
        let mut appender = CollectingAppender::default();
        let mut session = ParseSession::new(&mut appender, None);
        let by_identifier = session.resolve_location(" A ").unwrap();
        let by_unique_id = session
            .resolve_location(&by_identifier.unique_id.to_string())
            .unwrap();
        assert_eq!(by_identifier, by_unique_id);
    }

    #[test]
    fn unknown_unique_ids_are_location_errors() {
        let mut appender = CollectingAppender::default();
        let mut session = ParseSession::new(&mut appender, None);
        let err = session.resolve_location(&Uuid::nil().to_string()).unwrap_err();
        assert!(matches!(err, MappingError::Location(_)));
    }
}
