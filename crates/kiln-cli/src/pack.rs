//! Pack inspection commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use kiln_listing::{FsPackSource, ListingCache, PackType};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackTypeArg {
    Assets,
    Data,
}

impl From<PackTypeArg> for PackType {
    fn from(arg: PackTypeArg) -> Self {
        match arg {
            PackTypeArg::Assets => PackType::ClientResources,
            PackTypeArg::Data => PackType::ServerData,
        }
    }
}

#[derive(Args, Debug)]
pub struct NamespacesArgs {
    /// Pack root directory
    #[arg(value_name = "PACK")]
    pack: PathBuf,

    #[arg(long = "type", value_enum, default_value = "assets")]
    pack_type: PackTypeArg,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Pack root directory
    #[arg(value_name = "PACK")]
    pack: PathBuf,

    #[arg(short, long)]
    namespace: String,

    /// Directory prefix inside the namespace (default: everything)
    #[arg(short, long)]
    prefix: Option<String>,

    /// Only identifiers whose path ends with this suffix
    #[arg(long)]
    suffix: Option<String>,

    #[arg(long = "type", value_enum, default_value = "assets")]
    pack_type: PackTypeArg,
}

#[derive(Args, Debug)]
pub struct ExistsArgs {
    /// Pack root directory
    #[arg(value_name = "PACK")]
    pack: PathBuf,

    /// Path such as `assets/<namespace>/textures/a.png`
    #[arg(value_name = "PATH")]
    path: String,
}

fn open(pack: &Path) -> Result<ListingCache> {
    if !pack.is_dir() {
        bail!("Pack root {} is not a directory", pack.display());
    }
    Ok(ListingCache::new(Arc::new(FsPackSource::new(pack))))
}

pub fn namespaces(args: NamespacesArgs) -> Result<()> {
    let cache = open(&args.pack)?;
    for namespace in cache.namespaces(args.pack_type.into()).iter() {
        println!("{}", namespace);
    }
    Ok(())
}

pub fn list(args: ListArgs) -> Result<()> {
    let ids = matching(&args)?;
    for id in &ids {
        println!("{}", id);
    }
    eprintln!("{} identifiers", ids.len());
    Ok(())
}

fn matching(args: &ListArgs) -> Result<Vec<String>> {
    let cache = open(&args.pack)?;
    let pack_type = args.pack_type.into();
    let suffix = args.suffix.as_deref();

    let ids = match &args.prefix {
        Some(prefix) => cache.list(pack_type, &args.namespace, prefix, |id| {
            suffix.map_or(true, |s| id.path().ends_with(s))
        }),
        None => cache.list_all(pack_type, &args.namespace, |id| {
            suffix.map_or(true, |s| id.path().ends_with(s))
        }),
    };
    Ok(ids.iter().map(ToString::to_string).collect())
}

pub fn exists(args: ExistsArgs) -> Result<()> {
    let cache = open(&args.pack)?;
    if cache.exists(&args.path) {
        println!("yes");
        Ok(())
    } else {
        println!("no");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_pack_type_mapping() {
        assert_eq!(PackType::from(PackTypeArg::Assets), PackType::ClientResources);
        assert_eq!(PackType::from(PackTypeArg::Data), PackType::ServerData);
    }

    #[test]
    fn test_open_rejects_missing_pack() {
        let temp = TempDir::new().unwrap();
        assert!(open(&temp.path().join("nope")).is_err());
    }

    fn pack_with_model() -> TempDir {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("assets/demo/models/a.json");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"{}").unwrap();
        temp
    }

    fn list_args(pack: &TempDir, prefix: Option<&str>, suffix: Option<&str>) -> ListArgs {
        ListArgs {
            pack: pack.path().to_path_buf(),
            namespace: "demo".to_string(),
            prefix: prefix.map(str::to_string),
            suffix: suffix.map(str::to_string),
            pack_type: PackTypeArg::Assets,
        }
    }

    #[test]
    fn test_list_runs_against_directory() {
        let temp = pack_with_model();
        assert!(list(list_args(&temp, Some("models"), Some(".json"))).is_ok());
    }

    #[test]
    fn test_list_without_prefix_returns_whole_namespace() {
        let temp = pack_with_model();

        assert_eq!(matching(&list_args(&temp, None, None)).unwrap(), vec!["demo:models/a.json"]);
        assert_eq!(
            matching(&list_args(&temp, None, Some(".json"))).unwrap(),
            vec!["demo:models/a.json"]
        );
        assert!(matching(&list_args(&temp, None, Some(".png"))).unwrap().is_empty());
        assert_eq!(
            matching(&list_args(&temp, Some("models"), None)).unwrap(),
            vec!["demo:models/a.json"]
        );
    }

    #[test]
    fn test_list_args_prefix_is_optional() {
        let cli = ListArgsParser::try_parse_from(["list", "/pack", "-n", "demo"]).unwrap();
        assert_eq!(cli.args.prefix, None);
    }

    #[derive(Parser)]
    struct ListArgsParser {
        #[command(flatten)]
        args: ListArgs,
    }
}
