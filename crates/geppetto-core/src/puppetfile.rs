//! One Puppetfile on disk, bound to the environment it installs into.

use std::fs;
use std::path::PathBuf;

use crate::environment::Environment;
use crate::error::ManifestError;
use crate::module::Module;
use crate::parser;

pub struct PuppetFile {
    path: PathBuf,
    env: Environment,
}

/// A parsed Puppetfile with its global options already applied: the
/// environment carries the effective modules folder and forge modules
/// carry the effective registry base.
#[derive(Debug)]
pub struct LoadedManifest {
    pub modules: Vec<Module>,
    pub env: Environment,
}

impl PuppetFile {
    pub fn new(path: impl Into<PathBuf>, env: Environment) -> Self {
        Self { path: path.into(), env }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn load(&self) -> Result<LoadedManifest, ManifestError> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| ManifestError::Io { path: self.path.clone(), source: e })?;
        let parsed = parser::parse(&text)
            .map_err(|e| ManifestError::Malformed { path: self.path.clone(), source: e })?;

        let mut env = self.env.clone();
        if let Some(moduledir) = parsed.moduledir {
            // Relative moduledirs resolve against the manifest's own
            // directory, which is exactly the environment root.
            env.modules_folder = moduledir;
        }

        let mut modules = parsed.modules;
        if let Some(forge_url) = parsed.forge_url {
            for module in &mut modules {
                if let Module::Forge(forge) = module {
                    forge.set_forge_url(&forge_url);
                }
            }
        }

        Ok(LoadedManifest { modules, env })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Source;
    use crate::module::DEFAULT_FORGE_URL;

    fn environment(basedir: &std::path::Path) -> Environment {
        Environment::new(Source { basedir: basedir.to_path_buf(), ..Default::default() }, "")
    }

    #[test]
    fn load_applies_moduledir_and_forge_overrides() {
        let tmp = tempfile::tempdir().expect("tmp");
        let path = tmp.path().join("Puppetfile");
        fs::write(
            &path,
            "forge 'https://forge.example.com/'\n\
             moduledir 'thirdparty'\n\
             mod 'a/b', '1.2.3'\n\
             mod 'c', :git => 'https://git.example.com/c.git'\n",
        )
        .expect("write");

        let manifest = PuppetFile::new(&path, environment(tmp.path())).load().expect("load");
        assert_eq!(manifest.env.modules_folder, "thirdparty");
        assert_eq!(manifest.modules.len(), 2);
        match &manifest.modules[0] {
            Module::Forge(forge) => assert_eq!(forge.version(), Some("1.2.3")),
            other => panic!("expected a forge module, got {:?}", other),
        }
    }

    #[test]
    fn load_keeps_defaults_without_options() {
        let tmp = tempfile::tempdir().expect("tmp");
        let path = tmp.path().join("Puppetfile");
        fs::write(&path, "mod 'a/b'\n").expect("write");

        let manifest = PuppetFile::new(&path, environment(tmp.path())).load().expect("load");
        assert_eq!(manifest.env.modules_folder, "modules");
        match &manifest.modules[0] {
            Module::Forge(forge) => assert_eq!(forge.forge_url(), DEFAULT_FORGE_URL),
            other => panic!("expected a forge module, got {:?}", other),
        }
    }

    #[test]
    fn load_reports_missing_files() {
        let tmp = tempfile::tempdir().expect("tmp");
        let missing = tmp.path().join("Puppetfile");
        let err = PuppetFile::new(&missing, environment(tmp.path())).load().expect_err("io");
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[test]
    fn load_reports_malformed_manifests() {
        let tmp = tempfile::tempdir().expect("tmp");
        let path = tmp.path().join("Puppetfile");
        fs::write(&path, "mod \"ntp\" \"1.0.3\"\n").expect("write");

        let err = PuppetFile::new(&path, environment(tmp.path())).load().expect_err("malformed");
        assert!(err.to_string().contains("line 1"));
    }
}
