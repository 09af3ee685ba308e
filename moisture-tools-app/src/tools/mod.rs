pub mod moisture_tracking;
pub mod watershed_analysis;
pub mod zone_analysis;

use crate::config::RunConfig;
use crate::pool::RunSummary;
use crate::tables::{distinct_zones, parse_zone_list, read_shard_table, ZoneId};
use crate::tracking::discover_zones;
use serde_derive::Serialize;
use std::env;
use std::io::{Error, ErrorKind};
use std::path::{self, Path, PathBuf};

pub struct ToolManager {
    pub working_dir: String,
    pub verbose: bool,
    tool_names: Vec<String>,
}

impl ToolManager {
    pub fn new<'a>(working_directory: &'a str, verbose_mode: &'a bool) -> Result<ToolManager, Error> {
        let tool_names = vec![
            // zone_analysis
            "ScreenZones".to_string(),
            // moisture_tracking
            "AssembleRuns".to_string(),
            "RunShards".to_string(),
            "TrackFootprints".to_string(),
            // watershed_analysis
            "AtmosWatersheds".to_string(),
        ];
        Ok(ToolManager {
            working_dir: working_directory.to_string(),
            verbose: *verbose_mode,
            tool_names,
        })
    }

    pub fn get_tool(&self, tool_name: &str) -> Option<Box<dyn MoistureTool + 'static>> {
        match tool_name.to_lowercase().replace("_", "").as_ref() {
            "screenzones" => Some(Box::new(zone_analysis::ScreenZones::new())),
            "assembleruns" => Some(Box::new(moisture_tracking::AssembleRuns::new())),
            "runshards" => Some(Box::new(moisture_tracking::RunShards::new())),
            "trackfootprints" => Some(Box::new(moisture_tracking::TrackFootprints::new())),
            "atmoswatersheds" => Some(Box::new(watershed_analysis::AtmosWatersheds::new())),
            _ => None,
        }
    }

    pub fn run_tool(&self, tool_name: String, args: Vec<String>) -> Result<(), Error> {
        match self.get_tool(tool_name.as_ref()) {
            Some(tool) => tool.run(args, &self.working_dir, self.verbose),
            None => Err(Error::new(
                ErrorKind::NotFound,
                format!("Unrecognized tool name {}.", tool_name),
            )),
        }
    }

    pub fn tool_help(&self, tool_name: String) -> Result<(), Error> {
        match self.get_tool(tool_name.as_ref()) {
            Some(tool) => println!("{}", get_help(tool)),
            None => {
                return Err(Error::new(
                    ErrorKind::NotFound,
                    format!("Unrecognized tool name {}.", tool_name),
                ))
            }
        }
        Ok(())
    }

    pub fn tool_parameters(&self, tool_name: String) -> Result<(), Error> {
        match self.get_tool(tool_name.as_ref()) {
            Some(tool) => println!("{}", tool.get_tool_parameters()),
            None => {
                return Err(Error::new(
                    ErrorKind::NotFound,
                    format!("Unrecognized tool name {}.", tool_name),
                ))
            }
        }
        Ok(())
    }

    pub fn list_tools(&self) {
        let mut tool_details: Vec<(String, String)> = Vec::new();
        for val in &self.tool_names {
            if let Some(tool) = self.get_tool(val) {
                tool_details.push((tool.get_tool_name(), tool.get_tool_description()));
            }
        }
        tool_details.sort();
        let mut ret = format!("All {} Available Tools:\n", tool_details.len());
        for (name, description) in &tool_details {
            ret.push_str(&format!("{}: {}\n\n", name, description));
        }
        println!("{}", ret);
    }

    pub fn get_tool_names(&self) -> &[String] {
        &self.tool_names
    }
}

pub trait MoistureTool {
    fn get_source_file(&self) -> String;
    fn get_tool_name(&self) -> String;
    fn get_tool_description(&self) -> String;
    fn get_tool_parameters(&self) -> String;
    fn get_example_usage(&self) -> String;
    fn get_toolbox(&self) -> String;
    fn run<'a>(&self, args: Vec<String>, working_directory: &'a str, verbose: bool) -> Result<(), Error>;
}

fn get_help<'a>(tool: Box<dyn MoistureTool + 'a>) -> String {
    let tool_name = tool.get_tool_name();
    let description = tool.get_tool_description();
    let parameters = tool.get_tool_parameters();
    let toolbox = tool.get_toolbox();
    let mut p = String::new();
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(&parameters) {
        if let Some(params) = v["parameters"].as_array() {
            p.push_str("Flag               Description\n");
            p.push_str("-----------------  -----------\n");
            for param in params {
                let flags = param["flags"]
                    .as_array()
                    .map(|f| {
                        f.iter()
                            .filter_map(|s| s.as_str())
                            .collect::<Vec<&str>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                let desc = param["description"].as_str().unwrap_or("");
                p.push_str(&format!("{:<19}{}\n", flags, desc));
            }
        }
    }
    format!(
        "{}\nDescription:\n{}\nToolbox: {}\nParameters:\n\n{}\n\nExample usage:\n{}\n",
        tool_name,
        description,
        toolbox,
        p,
        tool.get_example_usage()
    )
}

#[derive(Default, Serialize)]
pub struct ToolParameter {
    pub name: String,
    pub flags: Vec<String>,
    pub description: String,
    pub parameter_type: ParameterType,
    pub default_value: Option<String>,
    pub optional: bool,
}

#[derive(Serialize)]
pub enum ParameterType {
    Boolean,
    String,
    StringList,
    Integer,
    Float,
    Directory,
    ExistingFile(ParameterFileType),
    NewFile(ParameterFileType),
    OptionList(Vec<String>),
}

impl Default for ParameterType {
    fn default() -> ParameterType {
        ParameterType::String
    }
}

#[derive(Serialize)]
pub enum ParameterFileType {
    Any,
    Csv,
    Json,
    Netcdf,
}

/// Usage line in the form `>>./moisture_tools -r=ToolName -v --wd="/path/to/data/" ...`.
pub(crate) fn example_usage(tool_name: &str, flags: &str) -> String {
    let sep: String = path::MAIN_SEPARATOR.to_string();
    let exe = env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| "moisture_tools".to_string());
    format!(
        ">>.*{0} -r={1} -v --wd=\"*path*to*data*\" {2}",
        exe, tool_name, flags
    )
    .replace("*", &sep)
}

pub(crate) fn get_tool_parameters_json(parameters: &[ToolParameter]) -> String {
    match serde_json::to_string(parameters) {
        Ok(json_str) => format!("{{\"parameters\":{}}}", json_str),
        Err(err) => format!("{:?}", err),
    }
}

pub(crate) fn print_welcome(tool_name: &str) {
    let welcome_len = format!("* Welcome to {} *", tool_name).len().max(28);
    println!("{}", "*".repeat(welcome_len));
    println!(
        "* Welcome to {} {}*",
        tool_name,
        " ".repeat(welcome_len - 15 - tool_name.len())
    );
    println!("* Powered by moisture_tools {}*", " ".repeat(welcome_len - 28));
    println!("{}", "*".repeat(welcome_len));
}

/// Splits one command line argument into its lowercased flag and, for
/// `--flag=value` arguments, its value.
pub(crate) fn split_arg(arg: &str) -> (String, Option<String>) {
    let arg = arg.replace('\"', "").replace('\'', "");
    let vec = arg.splitn(2, '=').collect::<Vec<&str>>();
    let flag = vec[0].to_lowercase();
    let value = if vec.len() > 1 { Some(vec[1].to_string()) } else { None };
    (flag, value)
}

/// Value of the flag at `args[i]`, given inline or as the next argument.
pub(crate) fn arg_value(args: &[String], i: usize, inline: Option<String>) -> Result<String, Error> {
    match inline {
        Some(v) => Ok(v),
        None => args
            .get(i + 1)
            .map(|v| v.replace('\"', "").replace('\'', ""))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("No value given for {}.", args[i]),
                )
            }),
    }
}

/// A bare boolean flag is true unless given as `--flag=false`.
pub(crate) fn flag_is_set(inline: &Option<String>) -> bool {
    match inline {
        Some(v) => !v.to_lowercase().contains("false"),
        None => true,
    }
}

pub(crate) fn parse_arg<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, Error> {
    value.trim().parse::<T>().map_err(|_| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("Invalid value '{}' for {}.", value, flag),
        )
    })
}

/// Paths without a separator are taken relative to the working directory.
pub(crate) fn resolve_path(file: &str, working_directory: &str) -> PathBuf {
    let sep: String = path::MAIN_SEPARATOR.to_string();
    if !file.contains(&sep) && !file.contains('/') && !working_directory.is_empty() {
        Path::new(working_directory).join(file)
    } else {
        PathBuf::from(file)
    }
}

pub(crate) fn config_from_env() -> Result<RunConfig, Error> {
    Ok(RunConfig::from_env()?)
}

/// Parameter entry for one of the input and output location flags shared by
/// the pipeline tools.
pub(crate) fn location_parameter(flag: &str) -> ToolParameter {
    let (name, description, parameter_type) = match flag {
        "--kernel_dir" => (
            "Transport Kernel Directory",
            "Directory holding the twelve monthly transport kernel files.",
            ParameterType::Directory,
        ),
        "--evap" => (
            "Evaporation Climatology File",
            "Monthly evaporation climatology (month, lat, lon).",
            ParameterType::ExistingFile(ParameterFileType::Netcdf),
        ),
        "--precip" => (
            "Precipitation Climatology File",
            "Monthly precipitation climatology (month, lat, lon).",
            ParameterType::ExistingFile(ParameterFileType::Netcdf),
        ),
        "--area" => (
            "Cell Area File",
            "Grid of cell areas (lat, lon).",
            ParameterType::ExistingFile(ParameterFileType::Netcdf),
        ),
        "--target_cells" => (
            "Coordinate Table Directory",
            "Directory of target_cells_{zone}.csv coordinate tables.",
            ParameterType::Directory,
        ),
        "--footprints" => (
            "Footprints Directory",
            "Directory holding shard and assembled footprint files.",
            ParameterType::Directory,
        ),
        _ => (
            "Watersheds Directory",
            "Directory receiving watershed outputs.",
            ParameterType::Directory,
        ),
    };
    ToolParameter {
        name: name.to_owned(),
        flags: vec![flag.to_owned()],
        description: description.to_owned(),
        parameter_type,
        default_value: None,
        optional: true,
    }
}

pub(crate) fn is_location_flag(flag: &str) -> bool {
    matches!(
        flag.trim_start_matches('-'),
        "kernel_dir" | "evap" | "precip" | "area" | "target_cells" | "footprints" | "watersheds"
    )
}

/// Points the matching `config` location at `value`.
pub(crate) fn apply_location_flag(config: &mut RunConfig, flag: &str, value: &str, working_directory: &str) {
    let path = resolve_path(value, working_directory);
    match flag.trim_start_matches('-') {
        "kernel_dir" => config.kernel_dir = path,
        "evap" => config.evap_path = path,
        "precip" => config.precip_path = path,
        "area" => config.area_path = path,
        "target_cells" => config.target_cells_dir = path,
        "footprints" => config.footprints_dir = path,
        "watersheds" => config.watersheds_dir = path,
        _ => {}
    }
}

/// Zones named by `--params` (a shard table), by `--zones` (an id list), or,
/// failing both or with `--zones=all`, every zone with a coordinate table.
pub(crate) fn resolve_zones(zones: &str, params: &Option<PathBuf>, config: &RunConfig) -> Result<Vec<ZoneId>, Error> {
    if let Some(params) = params {
        return Ok(distinct_zones(&read_shard_table(params)?));
    }
    if zones.is_empty() || zones.to_lowercase() == "all" {
        return Ok(discover_zones(&config.target_cells_dir)?);
    }
    Ok(parse_zone_list(zones)?)
}

/// Prints the summary of a batch run, optionally saves it as JSON, and fails
/// when any unit failed.
pub(crate) fn finish_batch(summary: &RunSummary, summary_file: &Option<PathBuf>) -> Result<(), Error> {
    for line in summary.lines() {
        println!("{}", line);
    }
    if let Some(path) = summary_file {
        summary.write_json(path)?;
    }
    if summary.failed() > 0 {
        return Err(Error::new(
            ErrorKind::Other,
            format!("{} of {} units failed.", summary.failed(), summary.reports.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_lookup() {
        let tm = ToolManager::new("", &false).unwrap();
        for name in tm.get_tool_names() {
            let tool = tm.get_tool(name).expect("listed tools exist");
            assert_eq!(&tool.get_tool_name(), name);
            let params: serde_json::Value = serde_json::from_str(&tool.get_tool_parameters()).unwrap();
            assert!(params["parameters"].as_array().map_or(false, |p| !p.is_empty()));
        }
        assert!(tm.get_tool("run_shards").is_some());
        assert!(tm.get_tool("NoSuchTool").is_none());
        assert!(tm.run_tool("NoSuchTool".to_string(), vec![]).is_err());
    }

    #[test]
    fn test_argument_helpers() {
        assert_eq!(split_arg("--Percent=99"), ("--percent".to_string(), Some("99".to_string())));
        assert_eq!(split_arg("--wd=\"/a=b/\""), ("--wd".to_string(), Some("/a=b/".to_string())));
        let args = vec!["--zone".to_string(), "4".to_string(), "--stop".to_string()];
        assert_eq!(arg_value(&args, 0, None).unwrap(), "4");
        assert!(arg_value(&args, 2, None).is_err());
        assert!(flag_is_set(&None));
        assert!(!flag_is_set(&Some("False".to_string())));
        assert_eq!(resolve_path("zones.nc", "/data"), PathBuf::from("/data/zones.nc"));
        assert_eq!(resolve_path("/abs/zones.nc", "/data"), PathBuf::from("/abs/zones.nc"));
    }

    #[test]
    fn test_location_flags() {
        let mut config = RunConfig::default();
        assert!(is_location_flag("--footprints") && is_location_flag("-evap"));
        assert!(!is_location_flag("--percent"));
        apply_location_flag(&mut config, "--footprints", "fp", "/data");
        apply_location_flag(&mut config, "--evap", "/clim/e.nc", "/data");
        assert_eq!(config.footprints_dir, PathBuf::from("/data/fp"));
        assert_eq!(config.evap_path, PathBuf::from("/clim/e.nc"));
        assert_eq!(location_parameter("--area").flags, vec!["--area".to_string()]);
    }
}
