use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "file-sync")]
#[command(about = "Upload a file to a file-sync server, or run the server", long_about = None)]
#[command(version)]
#[command(after_help = "Role is picked by the config file: an empty \"server\" runs the server, \
anything else uploads --fileName to that server.\n\n\
Long flags take two dashes: --configFile, --fileName, --filePath.")]
pub struct Cli {
    /// JSON configuration file
    #[arg(long = "configFile", visible_alias = "config-file")]
    pub config_file: PathBuf,

    /// Local file to upload (client role)
    #[arg(long = "fileName", visible_alias = "file-name")]
    pub file_name: Option<PathBuf>,

    /// Destination directory under the server's save root (client role)
    #[arg(long = "filePath", visible_alias = "file-path", default_value = "")]
    pub file_path: String,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_original_flag_names() {
        let cli = Cli::try_parse_from([
            "file-sync",
            "--configFile",
            "client.json",
            "--fileName",
            "photo.jpg",
            "--filePath",
            "camera",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config_file, PathBuf::from("client.json"));
        assert_eq!(cli.file_name, Some(PathBuf::from("photo.jpg")));
        assert_eq!(cli.file_path, "camera");
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_kebab_aliases() {
        let cli = Cli::try_parse_from(["file-sync", "--config-file", "server.json", "-vv"]).unwrap();
        assert_eq!(cli.config_file, PathBuf::from("server.json"));
        assert!(cli.file_name.is_none());
        assert_eq!(cli.file_path, "");
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_config_file_required() {
        assert!(Cli::try_parse_from(["file-sync"]).is_err());
    }

    #[test]
    fn test_single_dash_long_flag_rejected() {
        // Must fail outright rather than parse as a short flag plus value
        for args in [
            ["file-sync", "-configFile", "c.json"],
            ["file-sync", "-configFile=c.json", "-v"],
        ] {
            assert!(Cli::try_parse_from(args).is_err(), "{:?}", args);
        }
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
