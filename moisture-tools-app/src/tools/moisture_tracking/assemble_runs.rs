/*
This tool is part of the moisture_tools moisture tracking library.
Created: 14/10/2026
License: MIT
*/

use crate::pool::WorkerPool;
use crate::tools::*;
use crate::tracking::RunAssembler;
use moisture_common::utils::get_formatted_elapsed_time;
use std::io::{Error, ErrorKind};
use std::time::Instant;

/// Sums the shard files of each zone into one forward and one backward
/// footprint per zone.
pub struct AssembleRuns {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl AssembleRuns {
    pub fn new() -> AssembleRuns {
        let name = "AssembleRuns".to_string();
        let toolbox = "Moisture Tracking".to_string();
        let description = "Merges the shard footprints of each zone into zone-level forward and backward footprints.".to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Zone Ids".to_owned(),
            flags: vec!["--zones".to_owned()],
            description: "Comma separated zone ids, or 'all' for every coordinate table.".to_owned(),
            parameter_type: ParameterType::StringList,
            default_value: Some("all".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Shard Descriptor Table".to_owned(),
            flags: vec!["--params".to_owned()],
            description: "CSV of zone,start,stop rows; its distinct zones are assembled.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Csv),
            default_value: None,
            optional: true,
        });

        for flag in ["--target_cells", "--footprints"] {
            parameters.push(location_parameter(flag));
        }

        parameters.push(ToolParameter {
            name: "Workers".to_owned(),
            flags: vec!["--workers".to_owned()],
            description: "Number of zones assembled concurrently.".to_owned(),
            parameter_type: ParameterType::Integer,
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Summary File".to_owned(),
            flags: vec!["--summary".to_owned()],
            description: "Optional JSON file receiving the per-zone run summary.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Json),
            default_value: None,
            optional: true,
        });

        let example_usage = example_usage(&name, "--params=params.csv --footprints=moisture_footprints");

        AssembleRuns {
            name,
            description,
            toolbox,
            parameters,
            example_usage,
        }
    }
}

impl MoistureTool for AssembleRuns {
    fn get_source_file(&self) -> String {
        String::from(file!())
    }

    fn get_tool_name(&self) -> String {
        self.name.clone()
    }

    fn get_tool_description(&self) -> String {
        self.description.clone()
    }

    fn get_tool_parameters(&self) -> String {
        get_tool_parameters_json(&self.parameters)
    }

    fn get_example_usage(&self) -> String {
        self.example_usage.clone()
    }

    fn get_toolbox(&self) -> String {
        self.toolbox.clone()
    }

    fn run<'a>(&self, args: Vec<String>, working_directory: &'a str, verbose: bool) -> Result<(), Error> {
        let mut zones = String::new();
        let mut params_file = None;
        let mut summary_file = None;
        let mut config = config_from_env()?;

        if args.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Tool run with no parameters.",
            ));
        }
        for i in 0..args.len() {
            let (flag, inline) = split_arg(&args[i]);
            if flag == "-zones" || flag == "--zones" {
                zones = arg_value(&args, i, inline)?;
            } else if flag == "-params" || flag == "--params" {
                params_file = Some(resolve_path(&arg_value(&args, i, inline)?, working_directory));
            } else if flag == "-workers" || flag == "--workers" {
                config.max_workers = parse_arg(&flag, &arg_value(&args, i, inline)?)?;
            } else if flag == "-summary" || flag == "--summary" {
                summary_file = Some(resolve_path(&arg_value(&args, i, inline)?, working_directory));
            } else if is_location_flag(&flag) {
                let value = arg_value(&args, i, inline)?;
                apply_location_flag(&mut config, &flag, &value, working_directory);
            }
        }
        config.validate()?;

        if verbose {
            print_welcome(&self.get_tool_name());
        }

        let zones = resolve_zones(&zones, &params_file, &config)?;
        let start = Instant::now();
        if verbose {
            println!("Assembling {} zones...", zones.len());
        }
        let pool = WorkerPool::new(config.max_workers)?;
        let summary = RunAssembler::new(&config).run(&pool, &zones);

        let elapsed_time = get_formatted_elapsed_time(start);
        if verbose {
            println!("{}", &format!("Elapsed Time (excluding I/O): {}", elapsed_time));
        }
        finish_batch(&summary, &summary_file)
    }
}
