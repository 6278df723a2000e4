//! Osiris Resolver Tooling
//!
//! This is the entry-point of `osiris-resolver`, a command-line tool to
//! resolve the build configuration of an application. Its main input is the
//! `osiris-resolver.toml` manifest, which declares the base configuration,
//! dependencies, feature toggles, signing identities and build variants of
//! an application. This tool reads the manifest and resolves it into the
//! build plan of a variant.
//!
//! This CLI is mainly a dispatcher of all the operations available in
//! `osiris_resolver::op::*`. It is a simple clap-based CLI that forwards the
//! arguments to `osiris_resolver` and visualizes the results. Every error
//! kind maps to its own exit code, so calling build tools can react to
//! specific configuration mistakes.

use clap;
use osiris_resolver;

const EXIT_MANIFEST: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_OUTPUT: u8 = 3;
const EXIT_UNKNOWN_VARIANT: u8 = 10;
const EXIT_UNRESOLVED_MANAGED_VERSION: u8 = 11;
const EXIT_DUPLICATE_COORDINATE: u8 = 12;
const EXIT_UNKNOWN_SIGNING_IDENTITY: u8 = 13;
const EXIT_INVALID_SDK_RANGE: u8 = 14;
const EXIT_UNKNOWN_ALTERNATIVE: u8 = 15;
const EXIT_PLUGIN_ORDER: u8 = 16;

struct Cli {
    cmd: clap::Command,
}

fn arg_format(
    s: &str,
) -> Result<osiris_resolver::op::emit::Format, clap::error::Error> {
    s.parse().map_err(
        |_| {
            clap::error::Error::raw(
                clap::error::ErrorKind::ValueValidation,
                "Invalid output format, expected 'json', 'toml', or 'properties'",
            )
        }
    )
}

// Map resolution errors to their exit codes.
fn resolve_exit_code(error: &osiris_resolver::op::resolve::Error) -> u8 {
    use osiris_resolver::op::resolve::Error;

    match error {
        Error::UnknownVariant(_) => EXIT_UNKNOWN_VARIANT,
        Error::UnresolvedManagedVersion(_) => EXIT_UNRESOLVED_MANAGED_VERSION,
        Error::DuplicateCoordinate { .. } => EXIT_DUPLICATE_COORDINATE,
        Error::UnknownSigningIdentity { .. } => EXIT_UNKNOWN_SIGNING_IDENTITY,
        Error::InvalidSdkRange { .. } => EXIT_INVALID_SDK_RANGE,
        Error::UnknownAlternative { .. } => EXIT_UNKNOWN_ALTERNATIVE,
        Error::PluginOrder { .. } => EXIT_PLUGIN_ORDER,
    }
}

// Install the stderr log subscriber
//
// `OSIRIS_LOG` takes precedence and accepts any `EnvFilter` directive. Without
// it, only warnings are shown. `-v` enables the resolution steps logged at
// debug level, `-vv` everything.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("OSIRIS_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // A subscriber might already be installed when embedded. Keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

impl Cli {
    fn new() -> Self {
        let mut cmd;

        cmd = clap::Command::new("osiris-resolver")
            .propagate_version(true)
            .subcommand_required(true)
            .about("Osiris Resolver Tooling")
            .long_about("Resolve the build configuration of an application for a build variant")
            .version(clap::crate_version!());

        cmd = cmd.arg(
            clap::Arg::new("manifest")
                .long("manifest")
                .value_name("PATH")
                .help("Path to the resolver manifest relative to the working directory")
                .default_value("./osiris-resolver.toml")
                .value_parser(clap::builder::ValueParser::os_string())
                .global(true)
        );

        cmd = cmd.arg(
            clap::Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (repeat for more)")
                .action(clap::ArgAction::Count)
                .global(true)
        );

        cmd = cmd.subcommand(
            clap::Command::new("resolve")
                .about("Resolve the build plan of a variant")
                .arg(
                    clap::Arg::new("variant")
                        .long("variant")
                        .value_name("NAME")
                        .help("Name of the build variant to resolve")
                        .required(true)
                )
                .arg(
                    clap::Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format of the build plan")
                        .default_value("json")
                        .value_parser(arg_format)
                )
                .arg(
                    clap::Arg::new("output")
                        .long("output")
                        .value_name("PATH")
                        .help("Write the build plan to the given file instead of STDOUT")
                        .value_parser(clap::builder::ValueParser::os_string())
                )
        );

        cmd = cmd.subcommand(
            clap::Command::new("check")
                .about("Resolve all variants and report their status")
        );

        cmd = cmd.subcommand(
            clap::Command::new("variants")
                .about("List all defined variants")
        );

        Self {
            cmd: cmd,
        }
    }

    fn resolver(
        &self,
        m: &clap::ArgMatches,
    ) -> Result<osiris_resolver::op::resolve::Resolver, u8> {
        // Unwrap the manifest-path from the argument. It has a default value,
        // so it is always present.
        let manifest_path = m.get_one::<std::ffi::OsString>("manifest")
            .map(std::path::Path::new)
            .ok_or(EXIT_USAGE)?;

        // Parse the manifest from the path and load it.
        let manifest = osiris_resolver::manifest::Manifest::parse_path(manifest_path)
            .and_then(|v| v.load());
        match manifest {
            Err(e) => {
                eprintln!("Cannot load resolver manifest {:?}: {}", manifest_path, e);
                Err(EXIT_MANIFEST)
            },
            Ok(v) => {
                Ok(v)
            },
        }
    }

    fn op_resolve(
        &self,
        m: &clap::ArgMatches,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let resolver = self.resolver(m)?;
        let variant = m_op.get_one::<String>("variant").ok_or(EXIT_USAGE)?;
        let format = *m_op.get_one::<osiris_resolver::op::emit::Format>("format")
            .ok_or(EXIT_USAGE)?;
        let output = m_op.get_one::<std::ffi::OsString>("output");

        let plan = resolver.resolve(variant).map_err(|e| {
            eprintln!("Cannot resolve variant '{}': {}", variant, e);
            resolve_exit_code(&e)
        })?;

        match output {
            Some(path) => {
                osiris_resolver::op::emit::emit(&plan, format, std::path::Path::new(path))
                    .map_err(|e| {
                        eprintln!("Cannot emit build plan: {}", e);
                        EXIT_OUTPUT
                    })?;
            },
            None => {
                let content = osiris_resolver::op::emit::render(&plan, format)
                    .map_err(|e| {
                        eprintln!("Cannot emit build plan: {}", e);
                        EXIT_OUTPUT
                    })?;
                print!("{}", content);
            },
        }

        Ok(())
    }

    fn op_check(
        &self,
        m: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let resolver = self.resolver(m)?;
        let mut r = Ok(());

        for (name, result) in resolver.resolve_all() {
            match result {
                Ok(_) => println!("{}: ok", name),
                Err(e) => {
                    println!("{}: {}", name, e);
                    if r.is_ok() {
                        r = Err(resolve_exit_code(&e));
                    }
                },
            }
        }

        r
    }

    fn op_variants(
        &self,
        m: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let resolver = self.resolver(m)?;

        for name in resolver.variants().names() {
            println!("{}", name);
        }

        Ok(())
    }

    fn run(mut self) -> Result<(), u8> {
        let (m, r);

        r = self.cmd.try_get_matches_from_mut(
            std::env::args_os(),
        );

        match r {
            Ok(v) => m = v,
            Err(e) => {
                // Failing to print usage information is not actionable.
                let _ = e.print();
                return match e.kind() {
                    clap::error::ErrorKind::DisplayHelp |
                    clap::error::ErrorKind::DisplayVersion => Ok(()),
                    _ => Err(EXIT_USAGE),
                }
            }
        }

        init_logging(m.get_count("verbose"));

        match m.subcommand() {
            Some(("resolve", m_op)) => self.op_resolve(&m, m_op),
            Some(("check", _)) => self.op_check(&m),
            Some(("variants", _)) => self.op_variants(&m),
            _ => std::unreachable!(),
        }
    }
}

fn main() -> std::process::ExitCode {
    match Cli::new().run() {
        Ok(()) => 0.into(),
        Err(v) => v.into(),
    }
}
