//! Reader for a module's metadata.json dependency list.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::MetadataError;

#[derive(Debug, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

/// Version requirements are recorded but never resolved; the pipeline
/// installs the newest release of each dependency.
#[derive(Debug, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub version_requirement: Option<String>,
}

pub fn read(path: &Path) -> Result<Metadata, MetadataError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_dependency_names_and_requirements() {
        let tmp = tempfile::tempdir().expect("tmp");
        let path = tmp.path().join("metadata.json");
        fs::write(
            &path,
            r#"{
                "name": "puppetlabs-apache",
                "version": "1.2.3",
                "dependencies": [
                    {"name": "puppetlabs/stdlib", "version_requirement": ">= 2.4.0"},
                    {"name": "puppetlabs/concat"}
                ]
            }"#,
        )
        .expect("write");

        let metadata = read(&path).expect("read");
        assert_eq!(metadata.dependencies.len(), 2);
        assert_eq!(metadata.dependencies[0].name, "puppetlabs/stdlib");
        assert_eq!(metadata.dependencies[0].version_requirement.as_deref(), Some(">= 2.4.0"));
        assert_eq!(metadata.dependencies[1].version_requirement, None);
    }

    #[test]
    fn missing_dependencies_key_means_none() {
        let tmp = tempfile::tempdir().expect("tmp");
        let path = tmp.path().join("metadata.json");
        fs::write(&path, r#"{"name": "puppetlabs-apache"}"#).expect("write");
        assert!(read(&path).expect("read").dependencies.is_empty());
    }

    #[test]
    fn malformed_json_is_reported() {
        let tmp = tempfile::tempdir().expect("tmp");
        let path = tmp.path().join("metadata.json");
        fs::write(&path, "{ not json").expect("write");
        let err = read(&path).expect_err("malformed");
        assert!(err.to_string().contains("malformed"));
    }
}
