/*
This tool is part of the moisture_tools moisture tracking library.
Created: 14/10/2026
License: MIT
*/

use super::tracking_inputs;
use crate::config::timeout_from_secs;
use crate::pool::WorkerPool;
use crate::tables::{read_shard_table, write_shard_table};
use crate::tools::*;
use crate::tracking::{plan_zones, ShardOrchestrator};
use log::warn;
use moisture_common::utils::get_formatted_elapsed_time;
use std::io::{Error, ErrorKind};
use std::time::Instant;

/// Tracks every shard of a plan concurrently. The plan is either read from a
/// shard descriptor table or derived from the coordinate tables of the
/// requested zones.
pub struct RunShards {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl RunShards {
    pub fn new() -> RunShards {
        let name = "RunShards".to_string();
        let toolbox = "Moisture Tracking".to_string();
        let description = "Tracks the footprints of many shards on a worker pool and reports which succeeded, were skipped or failed.".to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Shard Descriptor Table".to_owned(),
            flags: vec!["--params".to_owned()],
            description: "CSV of zone,start,stop rows to run.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Csv),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Zone Ids".to_owned(),
            flags: vec!["--zones".to_owned()],
            description: "Comma separated zone ids to plan shards for, or 'all' for every coordinate table.".to_owned(),
            parameter_type: ParameterType::StringList,
            default_value: Some("all".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Shard Size".to_owned(),
            flags: vec!["--shard_size".to_owned()],
            description: "Maximum number of cells per shard when planning from zones.".to_owned(),
            parameter_type: ParameterType::Integer,
            default_value: Some("200".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Plan File".to_owned(),
            flags: vec!["--plan".to_owned()],
            description: "Optional CSV receiving the shard plan that was run.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Csv),
            default_value: None,
            optional: true,
        });

        for flag in ["--kernel_dir", "--evap", "--precip", "--area", "--target_cells", "--footprints"] {
            parameters.push(location_parameter(flag));
        }

        parameters.push(ToolParameter {
            name: "Skip Bias Correction".to_owned(),
            flags: vec!["--no_correction".to_owned()],
            description: "Use the flux climatologies without the water-balance correction factors.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Workers".to_owned(),
            flags: vec!["--workers".to_owned()],
            description: "Number of shards tracked concurrently.".to_owned(),
            parameter_type: ParameterType::Integer,
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Timeout (seconds)".to_owned(),
            flags: vec!["--timeout".to_owned()],
            description: "Abandon a shard after this many seconds; 0 disables the limit.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("0".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Summary File".to_owned(),
            flags: vec!["--summary".to_owned()],
            description: "Optional JSON file receiving the per-shard run summary.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Json),
            default_value: None,
            optional: true,
        });

        let example_usage = example_usage(
            &name,
            "--zones=1,2 --shard_size=200 --workers=8 --timeout=3600 --summary=shards.json",
        );

        RunShards {
            name,
            description,
            toolbox,
            parameters,
            example_usage,
        }
    }
}

impl MoistureTool for RunShards {
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
        let mut params_file = String::new();
        let mut zones = String::new();
        let mut plan_file = None;
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
            if flag == "-params" || flag == "--params" {
                params_file = arg_value(&args, i, inline)?;
            } else if flag == "-zones" || flag == "--zones" {
                zones = arg_value(&args, i, inline)?;
            } else if flag == "-shard_size" || flag == "--shard_size" {
                config.shard_size = parse_arg(&flag, &arg_value(&args, i, inline)?)?;
            } else if flag == "-plan" || flag == "--plan" {
                plan_file = Some(resolve_path(&arg_value(&args, i, inline)?, working_directory));
            } else if flag == "-no_correction" || flag == "--no_correction" {
                config.correction.apply = !flag_is_set(&inline);
            } else if flag == "-workers" || flag == "--workers" {
                config.max_workers = parse_arg(&flag, &arg_value(&args, i, inline)?)?;
            } else if flag == "-timeout" || flag == "--timeout" {
                config.unit_timeout = timeout_from_secs(parse_arg(&flag, &arg_value(&args, i, inline)?)?)?;
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

        let shards = if !params_file.is_empty() {
            read_shard_table(&resolve_path(&params_file, working_directory))?
        } else {
            let zones = resolve_zones(&zones, &None, &config)?;
            plan_zones(&config.target_cells_dir, &zones, config.shard_size)?
        };
        if let Some(path) = &plan_file {
            write_shard_table(path, &shards)?;
        }
        if shards.is_empty() {
            println!("No shards to run.");
            return Ok(());
        }

        if verbose {
            println!("Reading climatologies...");
        }
        let (kernel, climatology) = tracking_inputs(&mut config)?;
        match kernel.verify() {
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => warn!("transport kernel is incomplete, affected shards will be skipped: {}", e),
            Ok(()) => {}
        }

        let start = Instant::now();
        if verbose {
            println!("Tracking {} shards on {} workers...", shards.len(), config.max_workers);
        }
        let orchestrator = ShardOrchestrator::new(&config, &kernel, &climatology)?;
        let pool = WorkerPool::new(config.max_workers)?;
        let summary = orchestrator.run(&pool, &shards);

        let elapsed_time = get_formatted_elapsed_time(start);
        if verbose {
            println!("{}", &format!("Elapsed Time (excluding I/O): {}", elapsed_time));
        }
        finish_batch(&summary, &summary_file)
    }
}
