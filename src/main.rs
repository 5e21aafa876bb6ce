fn main() {
    #[cfg(feature = "cli")]
    octamap::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("octamap: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
