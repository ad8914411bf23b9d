use bytekit::helpers;
use bytekit::jvm::verifier::ClassSourceHierarchy;
use bytekit::jvm::{self, DirectoryClassSource, ReaderFlags, WriterFlags};

use clap::{crate_version, value_parser, Arg, ArgAction, Command};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;

fn main() -> Result<(), jvm::Error> {
    env_logger::init();

    let matches = Command::new("Class file toolkit")
        .version(crate_version!())
        .about("Inspect and rewrite JVM class files")
        .arg(
            Arg::new("transcript")
                .long("transcript")
                .action(ArgAction::SetTrue)
                .help("Print the builder calls which would rebuild the class"),
        )
        .arg(
            Arg::new("no-debug")
                .long("no-debug")
                .action(ArgAction::SetTrue)
                .requires("transcript")
                .help("Leave line numbers and local variables out of the transcript"),
        )
        .arg(
            Arg::new("parameters")
                .long("parameters")
                .action(ArgAction::SetTrue)
                .help("Print a unique name and the parameter names of every method"),
        )
        .arg(
            Arg::new("rewrite")
                .long("rewrite")
                .value_name("OUT")
                .value_parser(value_parser!(PathBuf))
                .help("Write the class back out, with recomputed frames, to this file"),
        )
        .arg(
            Arg::new("strip-lines")
                .long("strip-lines")
                .action(ArgAction::SetTrue)
                .requires("rewrite")
                .help("Remove line numbers from every method while rewriting"),
        )
        .arg(
            Arg::new("inline-subroutines")
                .long("inline-subroutines")
                .action(ArgAction::SetTrue)
                .requires("rewrite")
                .help("Inline `jsr`/`ret` subroutines in every method while rewriting"),
        )
        .arg(
            Arg::new("classpath")
                .long("classpath")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Append)
                .help("Directory of class files used to merge types while rewriting"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Class file to read")
                .value_parser(value_parser!(PathBuf))
                .required(true)
                .index(1),
        )
        .get_matches();

    let input: &PathBuf = matches.get_one("INPUT").ok_or_else(|| {
        jvm::Error::IoError(io::Error::new(ErrorKind::InvalidInput, "missing input"))
    })?;
    log::info!("Reading '{}'", input.display());
    let bytes = fs::read(input)?;

    if matches.get_flag("transcript") {
        let debug = !matches.get_flag("no-debug");
        print!("{}", helpers::transcribe_bytes(&bytes, debug)?);
        return Ok(());
    }

    if let Some(output) = matches.get_one::<PathBuf>("rewrite") {
        let mut class = helpers::class_node_from_bytes(&bytes)?;
        for method in &mut class.methods {
            if matches.get_flag("inline-subroutines") {
                *method = helpers::remove_subroutines(method)?;
            }
            if matches.get_flag("strip-lines") {
                *method = helpers::remove_line_numbers(method);
            }
        }

        let sources: Vec<DirectoryClassSource> = matches
            .get_many::<PathBuf>("classpath")
            .into_iter()
            .flatten()
            .map(DirectoryClassSource::new)
            .collect();
        let hierarchy = ClassSourceHierarchy::new(sources);
        let rewritten = jvm::write_class_with_hierarchy(
            &class,
            WriterFlags::COMPUTE_MAXS | WriterFlags::COMPUTE_FRAMES,
            &hierarchy,
        )?;
        log::info!("Writing '{}'", output.display());
        fs::write(output, rewritten)?;
        return Ok(());
    }

    let class = jvm::read_class(&bytes, ReaderFlags::SKIP_FRAMES)?;
    for method in &class.methods {
        if matches.get_flag("parameters") {
            println!(
                "{}: {}",
                helpers::unique_name_for(&class.name, &method.name, &method.descriptor),
                helpers::parameter_names(method).join(", ")
            );
        } else {
            println!("{}", helpers::method_declaration(&class.name, method));
        }
    }

    Ok(())
}
