//! Puppetfile parser.
//!
//! The format is line oriented: `#` starts a comment, a line ending in a
//! comma continues the current block, and a completed block is one of
//! `forge '<url>'`, `moduledir '<path>'` or `mod '<name>'[, <params>...]`.
//! Parameters accept both the `:key => value` and `:key: value` spellings.

use crate::error::MalformedManifest;
use crate::git::Ref;
use crate::module::{ForgeModule, GitModule, Module, TarballModule};

/// Everything a Puppetfile declares: its modules plus the two global
/// options.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedManifest {
    pub modules: Vec<Module>,
    pub forge_url: Option<String>,
    pub moduledir: Option<String>,
}

pub fn parse(input: &str) -> Result<ParsedManifest, MalformedManifest> {
    let mut manifest = ParsedManifest::default();
    let mut block = String::new();
    let mut block_line = 0;

    for (index, raw_line) in input.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if block.is_empty() {
            block_line = line_number;
        }
        block.push_str(line);

        if line.ends_with(',') {
            continue;
        }

        if block.starts_with("forge") {
            manifest.forge_url = Some(quoted_value(&block, block_line)?.to_string());
        } else if block.starts_with("moduledir") {
            manifest.moduledir = Some(quoted_value(&block, block_line)?.to_string());
        } else if block.starts_with("mod") {
            manifest.modules.push(parse_module(&block, block_line)?);
        } else {
            return Err(MalformedManifest {
                line: block_line,
                reason: format!("unrecognized statement {:?}", block),
            });
        }
        block.clear();
    }

    Ok(manifest)
}

/// The single quoted value of a `forge`/`moduledir` statement.
fn quoted_value(block: &str, line: usize) -> Result<&str, MalformedManifest> {
    block.split(['\'', '"']).nth(1).ok_or_else(|| MalformedManifest {
        line,
        reason: format!("missing quoted value in {:?}", block),
    })
}

fn parameter_value(part: &str) -> Option<&str> {
    let raw = if let Some((_, value)) = part.split_once("=>") {
        value
    } else {
        // The `:key: value` spelling. splitn keeps any colons inside the
        // value itself (URLs) intact.
        part.splitn(3, ':').nth(2)?
    };
    Some(raw.trim_matches(|c: char| c == ' ' || c == '\'' || c == '"'))
}

fn parse_module(block: &str, line: usize) -> Result<Module, MalformedManifest> {
    let malformed = |reason: String| MalformedManifest { line, reason };

    let mut name = String::new();
    let mut version: Option<String> = None;
    let mut remote_url: Option<String> = None;
    let mut repo_slug: Option<String> = None;
    let mut install_path: Option<String> = None;
    let mut tag: Option<String> = None;
    let mut reference: Option<String> = None;
    let mut branch: Option<String> = None;

    for (index, part) in block.split(',').enumerate() {
        let part = part.trim();

        if index == 0 {
            // `mod '<name>'`. Adjacent quoted values here mean a missing
            // comma, e.g. `mod "ntp" "1.0.3"`.
            let fields: Vec<&str> =
                part.split(['\'', '"']).filter(|f| !f.is_empty()).collect();
            if fields.len() != 2 {
                return Err(malformed(format!("missing comma in {:?}?", part)));
            }
            name = fields[1].to_string();
        } else if index == 1 && !part.contains("=>") && part != ":latest" && !part.contains(':') {
            // A bare second field is a version string; `:latest` is the
            // explicit spelling of "no pin".
            let v = part.trim_matches(|c: char| c == ' ' || c == '\'' || c == '"');
            if !v.is_empty() {
                version = Some(v.to_string());
            }
        } else if index == 1 && part == ":latest" {
            version = None;
        } else if part.starts_with(":github_tarball") {
            repo_slug = parameter_value(part).map(str::to_string);
        } else if part.starts_with(":git") {
            remote_url = parameter_value(part).map(str::to_string);
        } else if part.starts_with(":install_path") {
            install_path = parameter_value(part).map(str::to_string);
        } else if part.starts_with(":tag") {
            tag = parameter_value(part).map(str::to_string);
        } else if part.starts_with(":ref") {
            reference = parameter_value(part).map(str::to_string);
        } else if part.starts_with(":branch") {
            branch = parameter_value(part).map(str::to_string);
        } else {
            return Err(malformed(format!("unsupported parameter {:?}", part)));
        }
    }

    if let Some(path) = &install_path {
        if std::path::Path::new(path).is_absolute() {
            return Err(malformed(format!(
                "install_path must be relative for module {}",
                name
            )));
        }
    }

    if let Some(url) = remote_url {
        let requested = [&reference, &branch, &tag].iter().filter(|r| r.is_some()).count();
        if requested > 1 {
            return Err(malformed(format!(
                "can only set one of ref, branch, tag for module {}",
                name
            )));
        }
        let want = tag
            .map(Ref::Tag)
            .or(branch.map(Ref::Branch))
            .or(reference.map(Ref::Commit));
        return Ok(Module::Git(GitModule::new(name, url, install_path, want)));
    }

    if let Some(slug) = repo_slug {
        return Ok(Module::Tarball(TarballModule::new(name, slug, version, install_path)));
    }

    Ok(Module::Forge(ForgeModule::new(name, version)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(input: &str) -> Module {
        let manifest = parse(input).expect("parse");
        assert_eq!(manifest.modules.len(), 1);
        manifest.modules.into_iter().next().expect("one module")
    }

    #[test]
    fn git_module_spellings_are_equivalent() {
        let cases = [
            "mod 'puppetlabs/puppetlabs-apache', :git => 'https://github.com/puppetlabs/puppetlabs-apache.git'",
            "mod  \"puppetlabs/puppetlabs-apache\",    :git  =>      \"https://github.com/puppetlabs/puppetlabs-apache.git\"  ",
            "mod 'puppetlabs/puppetlabs-apache',:git:'https://github.com/puppetlabs/puppetlabs-apache.git'",
        ];
        let expected = Module::Git(GitModule::new(
            "puppetlabs/puppetlabs-apache",
            "https://github.com/puppetlabs/puppetlabs-apache.git",
            None,
            None,
        ));
        for case in cases {
            assert_eq!(parse_one(case), expected, "case: {}", case);
        }
    }

    #[test]
    fn forge_modules_with_and_without_versions() {
        let manifest = parse(
            "mod 'puppetlabs-razor'\n\
             mod 'puppetlabs-ntp', '0.0.3'\n\
             mod 'puppetlabs-stdlib', :latest\n",
        )
        .expect("parse");

        assert_eq!(
            manifest.modules,
            vec![
                Module::Forge(ForgeModule::new("puppetlabs-razor", None)),
                Module::Forge(ForgeModule::new("puppetlabs-ntp", Some("0.0.3".into()))),
                Module::Forge(ForgeModule::new("puppetlabs-stdlib", None)),
            ]
        );
    }

    #[test]
    fn global_options_and_continuation_lines() {
        let manifest = parse(
            "forge \"https://forgeapi.puppetlabs.com\"\n\
             moduledir \"test_folder\"\n\
             \n\
             mod \"ntp\", \"1.0.3\"   # pinned\n\
             mod 'puppetlabs-stdlib',\n\
             \x20 :git => \"git://github.com/puppetlabs/puppetlabs-stdlib.git\"\n",
        )
        .expect("parse");

        assert_eq!(manifest.forge_url.as_deref(), Some("https://forgeapi.puppetlabs.com"));
        assert_eq!(manifest.moduledir.as_deref(), Some("test_folder"));
        assert_eq!(
            manifest.modules,
            vec![
                Module::Forge(ForgeModule::new("ntp", Some("1.0.3".into()))),
                Module::Git(GitModule::new(
                    "puppetlabs-stdlib",
                    "git://github.com/puppetlabs/puppetlabs-stdlib.git",
                    None,
                    None,
                )),
            ]
        );
    }

    #[test]
    fn git_refs_tags_and_branches() {
        assert_eq!(
            parse_one("mod 'x', :git => 'r', :branch => 'feat'"),
            Module::Git(GitModule::new("x", "r", None, Some(Ref::Branch("feat".into()))))
        );
        assert_eq!(
            parse_one("mod 'x', :git => 'r', :tag => 'v1.0'"),
            Module::Git(GitModule::new("x", "r", None, Some(Ref::Tag("v1.0".into()))))
        );
        assert_eq!(
            parse_one("mod 'x', :git => 'r', :ref => '0123abc'"),
            Module::Git(GitModule::new("x", "r", None, Some(Ref::Commit("0123abc".into()))))
        );
    }

    #[test]
    fn install_path_rides_along() {
        assert_eq!(
            parse_one("mod 'x', :git => 'r', :install_path => 'site'"),
            Module::Git(GitModule::new("x", "r", Some("site".into()), None))
        );
        assert_eq!(
            parse_one("mod 'y', '1.0', :github_tarball => 'owner/repo'"),
            Module::Tarball(TarballModule::new("y", "owner/repo", Some("1.0".into()), None))
        );
    }

    #[test]
    fn absolute_install_path_is_rejected() {
        let err = parse("mod 'x', :git => 'r', :install_path => '/srv/site'")
            .expect_err("absolute install_path");
        assert!(err.reason.contains("install_path"));
    }

    #[test]
    fn at_most_one_of_ref_branch_tag() {
        let cases = [
            "mod 'puppetlabs-stdlib',\n :git => \"g\",\n :tag => \"1.0\",\n :branch => \"featurebranch\"",
            "mod 'puppetlabs-stdlib',\n :git => \"g\",\n :ref => \"12345678\",\n :branch => \"featurebranch\"",
            "mod 'puppetlabs-stdlib',\n :git => \"g\",\n :ref => \"12345678\",\n :tag => \"1.0\"",
        ];
        for case in cases {
            let err = parse(case).expect_err("conflicting refs");
            assert!(err.reason.contains("one of ref, branch, tag"), "case: {}", case);
        }
    }

    #[test]
    fn missing_comma_is_malformed_with_a_line_number() {
        let err = parse("mod \"ntp\" \"1.0.3\"").expect_err("missing comma");
        assert_eq!(err.line, 1);
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn dangling_parameter_line_is_malformed() {
        let err = parse(
            "forge \"https://forgeapi.puppetlabs.com\"\n\
             mod 'puppetlabs-stdlib'\n\
             \x20:git => \"git://github.com/puppetlabs/puppetlabs-stdlib.git\"\n",
        )
        .expect_err("parameter without a module");
        assert_eq!(err.line, 3);
    }

    #[test]
    fn unsupported_parameter_is_malformed() {
        let err = parse("mod 'x', :sparkle => 'yes'").expect_err("unknown parameter");
        assert!(err.reason.contains("unsupported parameter"));
    }

    #[test]
    fn comments_and_blanks_are_ignored() {
        let manifest = parse("# nothing here\n\n   # still nothing\n").expect("parse");
        assert!(manifest.modules.is_empty());
        assert!(manifest.forge_url.is_none());
    }

    #[test]
    fn reparsing_yields_identical_descriptors() {
        let input = "forge 'https://forge.example.com'\n\
                     mod 'a/b', '1.2.3'\n\
                     mod 'c', :git => 'url', :branch => 'main'\n\
                     mod 'd', :github_tarball => 'o/r'\n";
        assert_eq!(parse(input).expect("first"), parse(input).expect("second"));
    }
}
