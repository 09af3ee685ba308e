/*
This tool is part of the moisture_tools moisture tracking library.
Created: 14/10/2026
License: MIT
*/

use super::tracking_inputs;
use crate::config::timeout_from_secs;
use crate::pool::WorkerPool;
use crate::tables::{read_shard_table, ShardKey, ZoneId};
use crate::tools::*;
use crate::tracking::ShardOrchestrator;
use moisture_common::utils::get_formatted_elapsed_time;
use std::io::{Error, ErrorKind};
use std::time::Instant;

/// Tracks a single shard: rows `[start, stop)` of one zone's coordinate table.
pub struct TrackFootprints {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl TrackFootprints {
    pub fn new() -> TrackFootprints {
        let name = "TrackFootprints".to_string();
        let toolbox = "Moisture Tracking".to_string();
        let description = "Computes the summed forward and backward monthly footprints of one shard of a zone's cells.".to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Zone Id".to_owned(),
            flags: vec!["--zone".to_owned()],
            description: "Zone whose coordinate table is tracked.".to_owned(),
            parameter_type: ParameterType::Integer,
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Start Row".to_owned(),
            flags: vec!["--start".to_owned()],
            description: "First coordinate table row of the shard.".to_owned(),
            parameter_type: ParameterType::Integer,
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Stop Row".to_owned(),
            flags: vec!["--stop".to_owned()],
            description: "Row after the last row of the shard.".to_owned(),
            parameter_type: ParameterType::Integer,
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Shard Descriptor Table".to_owned(),
            flags: vec!["--params".to_owned()],
            description: "CSV of zone,start,stop rows; used with --job instead of --zone/--start/--stop.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Csv),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Job Number".to_owned(),
            flags: vec!["--job".to_owned()],
            description: "1-based row of the shard descriptor table to run.".to_owned(),
            parameter_type: ParameterType::Integer,
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
            name: "Timeout (seconds)".to_owned(),
            flags: vec!["--timeout".to_owned()],
            description: "Abandon the shard after this many seconds; 0 disables the limit.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("0".to_owned()),
            optional: true,
        });

        let example_usage = example_usage(
            &name,
            "--zone=12 --start=0 --stop=200 --kernel_dir=utrack --evap=evap.nc --precip=precip.nc --area=grid_area.nc",
        );

        TrackFootprints {
            name,
            description,
            toolbox,
            parameters,
            example_usage,
        }
    }
}

impl MoistureTool for TrackFootprints {
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
        let mut zone: Option<ZoneId> = None;
        let mut start: Option<usize> = None;
        let mut stop: Option<usize> = None;
        let mut params_file = String::new();
        let mut job: Option<usize> = None;
        let mut config = config_from_env()?;

        if args.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Tool run with no parameters.",
            ));
        }
        for i in 0..args.len() {
            let (flag, inline) = split_arg(&args[i]);
            if flag == "-zone" || flag == "--zone" {
                zone = Some(arg_value(&args, i, inline)?.parse::<ZoneId>()?);
            } else if flag == "-start" || flag == "--start" {
                start = Some(parse_arg(&flag, &arg_value(&args, i, inline)?)?);
            } else if flag == "-stop" || flag == "--stop" {
                stop = Some(parse_arg(&flag, &arg_value(&args, i, inline)?)?);
            } else if flag == "-params" || flag == "--params" {
                params_file = arg_value(&args, i, inline)?;
            } else if flag == "-job" || flag == "--job" {
                job = Some(parse_arg(&flag, &arg_value(&args, i, inline)?)?);
            } else if flag == "-no_correction" || flag == "--no_correction" {
                config.correction.apply = !flag_is_set(&inline);
            } else if flag == "-timeout" || flag == "--timeout" {
                config.unit_timeout = timeout_from_secs(parse_arg(&flag, &arg_value(&args, i, inline)?)?)?;
            } else if is_location_flag(&flag) {
                let value = arg_value(&args, i, inline)?;
                apply_location_flag(&mut config, &flag, &value, working_directory);
            }
        }

        let key = match (zone, start, stop) {
            (Some(zone), Some(start), Some(stop)) => {
                if stop < start {
                    return Err(Error::new(
                        ErrorKind::InvalidInput,
                        format!("--stop ({}) precedes --start ({}).", stop, start),
                    ));
                }
                ShardKey::new(zone, start, stop)
            }
            _ if !params_file.is_empty() => {
                let shards = read_shard_table(&resolve_path(&params_file, working_directory))?;
                let job = job.ok_or_else(|| {
                    Error::new(ErrorKind::InvalidInput, "--params requires a job number (--job).")
                })?;
                match job.checked_sub(1).and_then(|j| shards.get(j)) {
                    Some(key) => *key,
                    None => {
                        return Err(Error::new(
                            ErrorKind::InvalidInput,
                            format!("Job {} is outside the {} shards of the table.", job, shards.len()),
                        ))
                    }
                }
            }
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "A shard (--zone, --start and --stop, or --params and --job) was not specified.",
                ))
            }
        };
        config.validate()?;

        if verbose {
            print_welcome(&self.get_tool_name());
            println!("Reading climatologies...");
        }
        let (kernel, climatology) = tracking_inputs(&mut config)?;

        let start_time = Instant::now();
        if verbose {
            println!("Tracking shard {} ({} cells)...", key, key.len());
        }
        let orchestrator = ShardOrchestrator::new(&config, &kernel, &climatology)?;
        let pool = WorkerPool::new(1)?;
        let summary = orchestrator.run(&pool, &[key]);

        let elapsed_time = get_formatted_elapsed_time(start_time);
        if verbose {
            println!("{}", &format!("Elapsed Time (excluding I/O): {}", elapsed_time));
        }
        finish_batch(&summary, &None)
    }
}
