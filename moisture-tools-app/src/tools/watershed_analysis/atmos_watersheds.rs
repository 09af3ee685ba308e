/*
This tool is part of the moisture_tools moisture tracking library.
Created: 15/10/2026
License: MIT
*/

use crate::config::parse_bool;
use crate::pool::WorkerPool;
use crate::tools::*;
use crate::watersheds::WatershedDelineator;
use moisture_common::utils::get_formatted_elapsed_time;
use std::io::{Error, ErrorKind};
use std::time::Instant;

/// Delineates the percentile precipitationshed and evaporationshed of each
/// zone from its assembled footprints.
pub struct AtmosWatersheds {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl AtmosWatersheds {
    pub fn new() -> AtmosWatersheds {
        let name = "AtmosWatersheds".to_string();
        let toolbox = "Watershed Analysis".to_string();
        let description = "Finds the smallest set of cells holding a given percentage of each zone's annual footprint.".to_string();

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
            description: "CSV of zone,start,stop rows; its distinct zones are processed.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Csv),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Percentile".to_owned(),
            flags: vec!["--percent".to_owned()],
            description: "Share of the annual footprint the watershed must hold, in (0, 100].".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("99".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Format".to_owned(),
            flags: vec!["--format".to_owned()],
            description: "Gridded values and mask, or a dissolved polygon.".to_owned(),
            parameter_type: ParameterType::OptionList(vec!["netcdf".to_owned(), "geojson".to_owned()]),
            default_value: Some("geojson".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Normalize Coordinates".to_owned(),
            flags: vec!["--normalize".to_owned()],
            description: "Remap longitudes to [-180, 180) and order latitudes south to north; on by default for netcdf output.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: None,
            optional: true,
        });

        for flag in ["--target_cells", "--footprints", "--watersheds"] {
            parameters.push(location_parameter(flag));
        }

        parameters.push(ToolParameter {
            name: "Workers".to_owned(),
            flags: vec!["--workers".to_owned()],
            description: "Number of zones delineated concurrently.".to_owned(),
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

        let example_usage = example_usage(&name, "--zones=all --percent=99 --format=netcdf");

        AtmosWatersheds {
            name,
            description,
            toolbox,
            parameters,
            example_usage,
        }
    }
}

impl MoistureTool for AtmosWatersheds {
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
            } else if flag == "-percent" || flag == "--percent" {
                config.percentile = parse_arg(&flag, &arg_value(&args, i, inline)?)?;
            } else if flag == "-format" || flag == "--format" {
                config.output_format = arg_value(&args, i, inline)?.parse()?;
            } else if flag == "-normalize" || flag == "--normalize" {
                config.normalize_coordinates = Some(match &inline {
                    Some(v) => parse_bool(&flag, v)?,
                    None => true,
                });
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
        let delineator = WatershedDelineator::new(&config)?;

        if verbose {
            print_welcome(&self.get_tool_name());
        }

        let zones = resolve_zones(&zones, &params_file, &config)?;
        let start = Instant::now();
        if verbose {
            println!(
                "Delineating {}% watersheds for {} zones ({} output)...",
                config.percentile,
                zones.len(),
                config.output_format
            );
        }
        let pool = WorkerPool::new(config.max_workers)?;
        let summary = delineator.run(&pool, &zones);

        let elapsed_time = get_formatted_elapsed_time(start);
        if verbose {
            println!("{}", &format!("Elapsed Time (excluding I/O): {}", elapsed_time));
        }
        finish_batch(&summary, &summary_file)
    }
}
