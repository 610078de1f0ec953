use crate::CLAP_STYLING;
use clap::{ArgAction, arg, command};
use std::path::PathBuf;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("formscout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("formscout")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log crawl decisions to stderr (-v info, -vv debug)")
                .required(false)
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a host or collection of hosts and report every form, with its \
                inputs classified as fixed or fuzzable.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The URL to crawl")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs to crawl")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Deepest link level to follow from the start URL (default: 3)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-pages" <NUM_PAGES>)
                        .required(false)
                        .help("Stop scheduling once this many URLs were visited (default: 100)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <MILLISECONDS>)
                        .required(false)
                        .help("Per-navigation timeout in milliseconds (default: 5000)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"include-subdomains")
                        .required(false)
                        .help("Also crawl sub-domains of the target host")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("JSON crawl configuration; flags override its values")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"input-types" <PATH>)
                        .required(false)
                        .help("JSON file listing input types that are never fuzzable")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"login-path" <PATH>)
                        .required(false)
                        .help("Login page to submit before crawling, relative to the target"),
                )
                .arg(
                    arg!(--"login" <FIELD>)
                        .required(false)
                        .help("Login form field as name=value (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    arg!(--"login-file" <PATH>)
                        .required(false)
                        .help("JSON object of login form fields")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
}
