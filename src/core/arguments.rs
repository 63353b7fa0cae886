use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, name = "filer", about = "File server for the Filer application")]
pub struct Arguments {
    /// Disables the automatic indexing of files.
    #[arg(long = "disable-indexing")]
    pub disable_indexing: bool,

    /// Disables watching the filesystem for changes in real-time.
    #[arg(long = "disable-file-watchers")]
    pub disable_file_watchers: bool,

    /// Port to listen on. Overrides the configured port for this run only;
    /// use app-config.json to change it permanently.
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_off() {
        let args = Arguments::parse_from(["filer"]);
        assert!(!args.disable_indexing);
        assert!(!args.disable_file_watchers);
        assert_eq!(args.port, None);
    }

    #[test]
    fn port_override() {
        let args = Arguments::parse_from(["filer", "--port", "9000"]);
        assert_eq!(args.port, Some(9000));
    }
}
