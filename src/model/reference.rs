use serde::{Deserialize, Serialize};

use crate::model::vocab;

/// Sub-space of an organization: parallel variants of the same logical data
/// realized by a reserved postfix on the organization name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubSpace {
    Main,
    Editor,
    Inferred,
}

impl SubSpace {
    pub fn postfix(&self) -> &'static str {
        match self {
            SubSpace::Main => "",
            SubSpace::Editor => "editor",
            SubSpace::Inferred => "inferred",
        }
    }

    /// Determine the sub-space an organization name belongs to.
    pub fn of_organization(organization: &str) -> SubSpace {
        for sub_space in [SubSpace::Editor, SubSpace::Inferred] {
            if let Some(stripped) = organization.strip_suffix(sub_space.postfix()) {
                if !stripped.is_empty() {
                    return sub_space;
                }
            }
        }
        SubSpace::Main
    }

    /// Strip any sub-space postfix, returning the main organization.
    pub fn main_organization(organization: &str) -> &str {
        for sub_space in [SubSpace::Editor, SubSpace::Inferred] {
            if let Some(stripped) = organization.strip_suffix(sub_space.postfix()) {
                if !stripped.is_empty() {
                    return stripped;
                }
            }
        }
        organization
    }
}

/// A graph projection that can be written to and read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Space {
    Native,
    Editor,
    Inferred,
    Released,
}

impl Space {
    /// The storage space an instance reference naturally indexes into.
    pub fn of_sub_space(sub_space: SubSpace) -> Space {
        match sub_space {
            SubSpace::Main => Space::Native,
            SubSpace::Editor => Space::Editor,
            SubSpace::Inferred => Space::Inferred,
        }
    }
}

impl Default for Space {
    fn default() -> Self {
        Space::Native
    }
}

/// Identity of a schema: organization, domain, schema name and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaReference {
    pub organization: String,
    pub domain: String,
    pub schema: String,
    pub schema_version: String,
}

impl SchemaReference {
    pub fn new(
        organization: impl Into<String>,
        domain: impl Into<String>,
        schema: impl Into<String>,
        schema_version: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            domain: domain.into(),
            schema: schema.into(),
            schema_version: schema_version.into(),
        }
    }

    /// Canonical relative path: `org/domain/schema/version`.
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.organization, self.domain, self.schema, self.schema_version
        )
    }

    /// The vocabulary namespace unique to this schema. Unqualified keys of a
    /// payload are qualified against it.
    pub fn unique_namespace(&self) -> String {
        format!("{}{}/", vocab::NAMESPACE, self.relative_path())
    }

    pub fn sub_space(&self) -> SubSpace {
        SubSpace::of_organization(&self.organization)
    }

    pub fn is_in_sub_space(&self, sub_space: SubSpace) -> bool {
        self.sub_space() == sub_space
    }

    /// Project this schema into another sub-space by rewriting the
    /// organization postfix.
    pub fn to_sub_space(&self, sub_space: SubSpace) -> SchemaReference {
        let main = SubSpace::main_organization(&self.organization);
        SchemaReference {
            organization: format!("{}{}", main, sub_space.postfix()),
            domain: self.domain.clone(),
            schema: self.schema.clone(),
            schema_version: self.schema_version.clone(),
        }
    }

    pub fn main_organization(&self) -> &str {
        SubSpace::main_organization(&self.organization)
    }

    /// Parse a schema reference from a relative or absolute URL. The version
    /// segment (`v` followed by a dotted number) anchors the parse, so
    /// arbitrary prefixes are tolerated.
    pub fn from_url(url: &str) -> Option<SchemaReference> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for (index, segment) in segments.iter().enumerate() {
            if is_version_segment(segment) && index >= 3 {
                return Some(SchemaReference::new(
                    segments[index - 3],
                    segments[index - 2],
                    segments[index - 1],
                    *segment,
                ));
            }
        }
        None
    }
}

fn is_version_segment(segment: &str) -> bool {
    let Some(rest) = segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Identity of one versioned document of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceReference {
    pub schema: SchemaReference,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl InstanceReference {
    pub fn new(schema: SchemaReference, id: impl Into<String>) -> Self {
        Self {
            schema,
            id: id.into(),
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Canonical relative path: `org/domain/schema/version/id`.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.schema.relative_path(), self.id)
    }

    /// Full identifier, optionally carrying the revision. An unset revision
    /// is reported as revision 1.
    pub fn full_id(&self, with_revision: bool) -> String {
        if with_revision {
            format!("{}?rev={}", self.relative_path(), self.revision.unwrap_or(1))
        } else {
            self.relative_path()
        }
    }

    /// Two references address the same instance when everything but the
    /// revision matches.
    pub fn is_same_instance_regardless_of_revision(&self, other: &InstanceReference) -> bool {
        self.schema == other.schema && self.id == other.id
    }

    pub fn sub_space(&self) -> SubSpace {
        self.schema.sub_space()
    }

    /// Project this instance into another sub-space.
    pub fn to_sub_space(&self, sub_space: SubSpace) -> InstanceReference {
        InstanceReference {
            schema: self.schema.to_sub_space(sub_space),
            id: self.id.clone(),
            revision: self.revision,
        }
    }

    /// Parse an instance reference from a relative or absolute URL,
    /// including an optional `?rev=N` query.
    pub fn from_url(url: &str) -> Option<InstanceReference> {
        let mut parts = url.splitn(2, '?');
        let path = parts.next().unwrap_or(url);
        let revision = parts.next().and_then(|query| {
            query
                .split('&')
                .find_map(|p| p.strip_prefix("rev="))
                .and_then(|v| v.parse::<u64>().ok())
        });

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for (index, segment) in segments.iter().enumerate() {
            if is_version_segment(segment) && index >= 3 && index + 1 < segments.len() {
                let schema = SchemaReference::new(
                    segments[index - 3],
                    segments[index - 2],
                    segments[index - 1],
                    *segment,
                );
                let mut reference = InstanceReference::new(schema, segments[index + 1]);
                reference.revision = revision;
                return Some(reference);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_space_instance() -> InstanceReference {
        InstanceReference::new(
            SchemaReference::new("foo", "bar", "foobar", "v0.0.1"),
            "barfoo",
        )
    }

    #[test]
    fn parses_instance_reference_with_revision_from_url() {
        let result = InstanceReference::from_url("foo/bar/foobar/v0.0.1/barfoo?rev=12").unwrap();
        assert_eq!(result.schema.organization, "foo");
        assert_eq!(result.schema.domain, "bar");
        assert_eq!(result.schema.schema, "foobar");
        assert_eq!(result.schema.schema_version, "v0.0.1");
        assert_eq!(result.id, "barfoo");
        assert_eq!(result.revision, Some(12));
    }

    #[test]
    fn parses_schema_reference_from_absolute_url() {
        let schema = SchemaReference::from_url("https://foo/v0/foo/core/bar/v1.0.0").unwrap();
        assert_eq!(schema.organization, "foo");
        assert_eq!(schema.domain, "core");
        assert_eq!(schema.schema, "bar");
        assert_eq!(schema.schema_version, "v1.0.0");
    }

    #[test]
    fn relative_paths() {
        let instance = main_space_instance();
        assert_eq!(instance.relative_path(), "foo/bar/foobar/v0.0.1/barfoo");
        assert_eq!(instance.schema.relative_path(), "foo/bar/foobar/v0.0.1");
    }

    #[test]
    fn unique_namespace_embeds_the_schema_path() {
        let schema = SchemaReference::new("foo", "core", "bar", "v1.0.0");
        assert_eq!(
            schema.unique_namespace(),
            format!("{}foo/core/bar/v1.0.0/", vocab::NAMESPACE)
        );
    }

    #[test]
    fn full_id_defaults_to_revision_one() {
        let instance = main_space_instance();
        assert_eq!(instance.full_id(false), "foo/bar/foobar/v0.0.1/barfoo");
        assert_eq!(instance.full_id(true), "foo/bar/foobar/v0.0.1/barfoo?rev=1");
        assert_eq!(
            instance.with_revision(20).full_id(true),
            "foo/bar/foobar/v0.0.1/barfoo?rev=20"
        );
    }

    #[test]
    fn same_instance_regardless_of_revision() {
        let instance = main_space_instance();
        let newer = instance.clone().with_revision(30);
        assert!(instance.is_same_instance_regardless_of_revision(&newer));

        let other = InstanceReference::new(instance.schema.clone(), "bar");
        assert!(!instance.is_same_instance_regardless_of_revision(&other));
    }

    #[test]
    fn sub_space_projection_rewrites_the_organization() {
        let instance = main_space_instance();
        let editor = instance.to_sub_space(SubSpace::Editor);
        assert_eq!(editor.schema.organization, "fooeditor");
        assert_eq!(
            editor.relative_path(),
            "fooeditor/bar/foobar/v0.0.1/barfoo"
        );
        assert_eq!(editor.schema.main_organization(), "foo");
        assert!(editor.schema.is_in_sub_space(SubSpace::Editor));

        // Projecting back to main restores the original reference.
        assert_eq!(editor.to_sub_space(SubSpace::Main), instance);
    }

    #[test]
    fn main_organization_extraction() {
        assert_eq!(SubSpace::main_organization("fooeditor"), "foo");
        assert_eq!(SubSpace::main_organization("foo"), "foo");
        assert_eq!(SubSpace::of_organization("fooinferred"), SubSpace::Inferred);
        assert_eq!(SubSpace::of_organization("foo"), SubSpace::Main);
    }
}
