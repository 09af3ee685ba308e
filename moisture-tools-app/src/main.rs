/*
moisture_tools command line front end.
License: MIT
*/

use moisture_tools::tools::ToolManager;
use std::env;
use std::io::{Error, ErrorKind};
use std::path;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(err) = run() {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let sep: &str = &path::MAIN_SEPARATOR.to_string();
    let mut working_dir = String::new();
    let mut tool_name = String::new();
    let mut run_tool = false;
    let mut tool_help = false;
    let mut tool_parameters = false;
    let mut list_tools = false;
    let mut verbose = false;
    let mut tool_args_vec: Vec<String> = vec![];

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        help();
        return Ok(());
    }
    for arg in &args {
        let flag_val = arg.to_lowercase().replace("--", "-");
        let value = || -> String {
            let v = arg.replace('\"', "").replace('\'', "");
            match v.split_once('=') {
                Some((_, val)) => val.trim().to_string(),
                None => String::new(),
            }
        };
        if flag_val == "-h" || flag_val == "-help" {
            help();
            return Ok(());
        } else if flag_val == "-version" {
            version();
            return Ok(());
        } else if flag_val.starts_with("-wd") || flag_val.starts_with("-working_directory") {
            working_dir = value();
            if !working_dir.is_empty() && !working_dir.ends_with(sep) {
                working_dir.push_str(sep);
            }
        } else if flag_val.starts_with("-run") || flag_val.starts_with("-r=") {
            tool_name = value();
            run_tool = true;
        } else if flag_val.starts_with("-toolhelp") {
            tool_name = value();
            tool_help = true;
        } else if flag_val.starts_with("-toolparameters") {
            tool_name = value();
            tool_parameters = true;
        } else if flag_val == "-listtools" || flag_val == "-list_tools" {
            list_tools = true;
        } else if flag_val == "-v" || flag_val == "-verbose" {
            verbose = true;
        } else {
            tool_args_vec.push(arg.trim().to_string());
        }
    }

    let tm = ToolManager::new(&working_dir, &verbose)?;
    if run_tool {
        if tool_name.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "No tool named with --run."));
        }
        tm.run_tool(tool_name, tool_args_vec)
    } else if tool_help {
        tm.tool_help(tool_name)
    } else if tool_parameters {
        tm.tool_parameters(tool_name)
    } else if list_tools {
        tm.list_tools();
        Ok(())
    } else {
        help();
        Ok(())
    }
}

fn help() {
    let exe = env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| "moisture_tools".to_string());
    let s = format!(
        "moisture_tools Help

The following commands are recognized:
-h, --help         Prints help information.
--listtools        Lists all available tools.
-r, --run          Runs a tool; used in conjunction with --wd flag.
--toolhelp         Prints the help associated with a tool.
--toolparameters   Prints the parameters (in json form) for a specific tool.
-v                 Verbose mode. Without this flag, tool outputs will not be printed.
--version          Prints the version information.
--wd               Changes the working directory.

Library logging is controlled with the RUST_LOG environment variable, and run
settings with the MOISTURE_* variables.

Example Usage:
>> ./{} -r=RunShards -v --wd=\"/path/to/data/\" --zones=1,2 --workers=8
",
        exe
    );
    println!("{}", s);
}

fn version() {
    println!("moisture_tools v{}", env!("CARGO_PKG_VERSION"));
}
