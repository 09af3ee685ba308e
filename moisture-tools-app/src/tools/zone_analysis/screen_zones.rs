/*
This tool is part of the moisture_tools moisture tracking library.
Created: 14/10/2026
License: MIT
*/

use crate::pool::WorkerPool;
use crate::tables::parse_zone_list;
use crate::tools::*;
use crate::zones::{ZoneRaster, ZoneScreener};
use moisture_common::utils::get_formatted_elapsed_time;
use std::io::{Error, ErrorKind};
use std::time::Instant;

/// Writes one `target_cells_{zone}.csv` coordinate table for every zone of a
/// categorical zone raster.
pub struct ScreenZones {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl ScreenZones {
    pub fn new() -> ScreenZones {
        let name = "ScreenZones".to_string();
        let toolbox = "Zone Analysis".to_string();
        let description =
            "Lists the cell coordinates of each zone in a categorical zone raster.".to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Input Zone Raster File".to_owned(),
            flags: vec!["--zones".to_owned()],
            description: "NetCDF zone raster on the tracking lattice.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Netcdf),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Zone Variable".to_owned(),
            flags: vec!["--variable".to_owned()],
            description: "Name of the zone id variable.".to_owned(),
            parameter_type: ParameterType::String,
            default_value: Some("Band1".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Zone Ids".to_owned(),
            flags: vec!["--ids".to_owned()],
            description: "Comma separated zone ids; every id in the raster when omitted.".to_owned(),
            parameter_type: ParameterType::StringList,
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Directory".to_owned(),
            flags: vec!["--out_dir".to_owned()],
            description: "Directory receiving the coordinate tables.".to_owned(),
            parameter_type: ParameterType::Directory,
            default_value: Some("target_cells".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Workers".to_owned(),
            flags: vec!["--workers".to_owned()],
            description: "Number of zones screened concurrently.".to_owned(),
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

        let example_usage = example_usage(&name, "--zones=basins.nc --ids=1,2,7 --out_dir=target_cells");

        ScreenZones {
            name,
            description,
            toolbox,
            parameters,
            example_usage,
        }
    }
}

impl MoistureTool for ScreenZones {
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
        let mut zones_file = String::new();
        let mut ids = String::new();
        let mut out_dir = String::new();
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
                zones_file = arg_value(&args, i, inline)?;
            } else if flag == "-variable" || flag == "--variable" {
                config.variables.zones = arg_value(&args, i, inline)?;
            } else if flag == "-ids" || flag == "--ids" {
                ids = arg_value(&args, i, inline)?;
            } else if flag == "-out_dir" || flag == "--out_dir" {
                out_dir = arg_value(&args, i, inline)?;
            } else if flag == "-workers" || flag == "--workers" {
                config.max_workers = parse_arg(&flag, &arg_value(&args, i, inline)?)?;
            } else if flag == "-summary" || flag == "--summary" {
                summary_file = Some(resolve_path(&arg_value(&args, i, inline)?, working_directory));
            }
        }

        if zones_file.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Input zone raster (--zones) not specified.",
            ));
        }
        config.validate()?;

        if verbose {
            print_welcome(&self.get_tool_name());
        }

        let zones_path = resolve_path(&zones_file, working_directory);
        let out_path = if out_dir.is_empty() {
            config.target_cells_dir.clone()
        } else {
            resolve_path(&out_dir, working_directory)
        };

        if verbose {
            println!("Reading zone raster...");
        }
        let raster = ZoneRaster::load(&zones_path, &config.variables.zones)?;

        let start = Instant::now();
        let ids = if ids.trim().is_empty() {
            raster.distinct_ids()
        } else {
            parse_zone_list(&ids)?
        };
        if verbose {
            println!("Screening {} zones...", ids.len());
        }

        let pool = WorkerPool::new(config.max_workers)?;
        let summary = ZoneScreener::new(&raster, &out_path).run(&pool, &ids);

        let elapsed_time = get_formatted_elapsed_time(start);
        if verbose {
            println!("{}", &format!("Elapsed Time (excluding I/O): {}", elapsed_time));
        }
        finish_batch(&summary, &summary_file)
    }
}
