//! Command dispatch

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::application::services::LoadedForest;
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands, OutputFormat};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::Point;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;
use crate::tree_traits::TreeNodeConvert;
use crate::util::path::{expand_path, is_rsml};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage("no command given, see --help".into()));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => cmd_config(cli, command),
        _ => {
            let container = create_container(cli)?;
            let ctx = Ctx {
                container: &container,
                format: cli.format,
            };
            match command {
                Commands::Stats { file } => ctx.stats(file),
                Commands::Roots { file } => ctx.roots(file),
                Commands::Nodes { file } => ctx.nodes(file),
                Commands::Marks { file } => ctx.marks(file),
                Commands::Tree { file } => ctx.tree(file),
                Commands::Hull { file } => ctx.hull(file),
                Commands::Batch { dir, recursive } => ctx.batch(dir, *recursive),
                Commands::Completion { .. } | Commands::Config { .. } => Ok(()),
            }
        }
    }
}

fn project_dir(cli: &Cli) -> Option<PathBuf> {
    cli.project_dir
        .as_deref()
        .map(expand_path)
        .or_else(|| std::env::current_dir().ok())
}

fn create_container(cli: &Cli) -> CliResult<ServiceContainer> {
    let settings = Settings::load(project_dir(cli).as_deref())?;
    Ok(ServiceContainer::new(settings))
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(project_dir(cli).as_deref())?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            let show = |label: &str, path: Option<PathBuf>| match path {
                Some(p) if p.exists() => output::success(&format!("{label}: {}", p.display())),
                Some(p) => output::failure(&format!("{label}: {} (not found)", p.display())),
                None => output::failure(&format!("{label}: unavailable")),
            };
            show("global", global_config_path());
            show("local", project_dir(cli).map(|d| local_config_path(&d)));
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(())
}

fn emit_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| ApplicationError::OperationFailed {
        context: "serialize report".into(),
        source: Box::new(e),
    })?;
    writeln!(io::stdout().lock(), "{text}").map_err(|e| InfraError::io("write report", e))?;
    Ok(())
}

struct Ctx<'a> {
    container: &'a ServiceContainer,
    format: OutputFormat,
}

impl Ctx<'_> {
    fn precision(&self) -> usize {
        self.container.settings.report.precision
    }

    fn n(&self, v: f64) -> String {
        output::num(Some(v), self.precision())
    }

    fn opt(&self, v: Option<f64>) -> String {
        output::num(v, self.precision())
    }

    fn load(&self, file: &Path) -> CliResult<LoadedForest> {
        let path = expand_path(file);
        if !is_rsml(&path) {
            output::warning(&format!("{} has no .rsml extension", path.display()));
        }
        let loaded = self.container.analysis.load(&path)?;
        if self.format == OutputFormat::Table {
            for w in &loaded.report.warnings {
                output::warning(w);
            }
        }
        Ok(loaded)
    }

    #[instrument(level = "debug", skip(self))]
    fn stats(&self, file: &Path) -> CliResult<()> {
        let loaded = self.load(file)?;
        let s = self.container.analysis.engine(&loaded.forest).forest_stats();
        if self.format == OutputFormat::Json {
            return emit_json(&s);
        }

        let title = loaded
            .report
            .metadata
            .image
            .clone()
            .unwrap_or_else(|| loaded.source.display().to_string());
        output::header(&title);
        let w = 26;
        output::field("roots", &s.root_count, w);
        output::field("total length (cm)", &self.n(s.total_length), w);
        output::field("convex hull area (cm²)", &self.n(s.convex_hull_area), w);
        output::field("primaries", &s.primary_count, w);
        output::field("primary total length", &self.n(s.primary_total_length), w);
        output::field("primary mean length", &self.n(s.primary_mean_length), w);
        output::field("primary mean diameter", &self.n(s.primary_mean_diameter), w);
        output::field("lateral mean density", &self.n(s.lateral_mean_density), w);
        output::field("laterals", &s.lateral_count, w);
        output::field("lateral total length", &self.n(s.lateral_total_length), w);
        output::field("lateral mean length", &self.n(s.lateral_mean_length), w);
        output::field("lateral mean diameter", &self.n(s.lateral_mean_diameter), w);
        output::field("lateral insertion angle", &self.n(s.lateral_mean_insertion_angle), w);
        output::field("mean inter-branch (cm)", &self.n(s.mean_inter_branch), w);
        output::field("primary nodes", &s.primary_node_count, w);
        output::field("lateral nodes", &s.lateral_node_count, w);
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn roots(&self, file: &Path) -> CliResult<()> {
        let loaded = self.load(file)?;
        let rows = self.container.analysis.engine(&loaded.forest).root_stats();
        if self.format == OutputFormat::Json {
            return emit_json(&rows);
        }

        let table: Vec<Vec<String>> = rows
            .iter()
            .map(|r| {
                vec![
                    r.key.to_string(),
                    r.id.clone(),
                    r.parent_key.map(|k| k.to_string()).unwrap_or_else(|| "-1".into()),
                    r.child_order.to_string(),
                    r.po_accession.clone(),
                    self.n(r.length),
                    self.n(r.diameter),
                    self.n(r.surface),
                    self.n(r.volume),
                    self.n(r.convex_hull_area),
                    self.n(r.insertion_position),
                    self.n(r.insertion_angle),
                    r.child_count.to_string(),
                    self.n(r.child_density),
                    r.first_child.map(|k| k.to_string()).unwrap_or_else(|| "-".into()),
                    self.opt(r.first_child_position),
                    r.last_child.map(|k| k.to_string()).unwrap_or_else(|| "-".into()),
                    self.opt(r.last_child_position),
                ]
            })
            .collect();
        output::table(
            &[
                "root", "name", "parent", "order", "ontology", "length", "diameter", "surface",
                "volume", "hull_area", "ins_pos", "ins_angle", "n_child", "density", "first",
                "first_pos", "last", "last_pos",
            ],
            &table,
        );
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn nodes(&self, file: &Path) -> CliResult<()> {
        let loaded = self.load(file)?;
        let rows = self.container.analysis.engine(&loaded.forest).node_records();
        if self.format == OutputFormat::Json {
            return emit_json(&rows);
        }

        let table: Vec<Vec<String>> = rows
            .iter()
            .map(|n| {
                vec![
                    n.root_key.to_string(),
                    n.root_id.clone(),
                    self.n(n.x),
                    self.n(n.y),
                    self.n(n.theta),
                    self.n(n.diameter),
                    self.n(n.distance_from_base),
                    self.n(n.distance_from_apex),
                    n.child_order.to_string(),
                    n.po_accession.clone(),
                ]
            })
            .collect();
        output::table(
            &[
                "root", "name", "x", "y", "theta", "diameter", "from_base", "from_apex", "order",
                "ontology",
            ],
            &table,
        );
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn marks(&self, file: &Path) -> CliResult<()> {
        let loaded = self.load(file)?;
        let rows = self.container.analysis.engine(&loaded.forest).mark_records();
        if self.format == OutputFormat::Json {
            return emit_json(&rows);
        }

        let table: Vec<Vec<String>> = rows
            .iter()
            .map(|m| {
                vec![
                    m.source.clone().unwrap_or_else(|| "-".into()),
                    m.root_key.to_string(),
                    m.root_id.clone(),
                    m.mark_type.clone(),
                    self.n(m.position_from_base),
                    self.n(m.diameter),
                    self.n(m.angle),
                    self.opt(m.x),
                    self.opt(m.y),
                    m.child_order.to_string(),
                    m.po_accession.clone(),
                    m.value.clone(),
                ]
            })
            .collect();
        output::table(
            &[
                "source", "root", "name", "type", "position", "diameter", "angle", "x", "y",
                "order", "ontology", "value",
            ],
            &table,
        );
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn tree(&self, file: &Path) -> CliResult<()> {
        let loaded = self.load(file)?;
        output::info(&loaded.forest.to_tree_string());
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn hull(&self, file: &Path) -> CliResult<()> {
        let loaded = self.load(file)?;
        let ps = loaded.forest.pixel_size();
        let hull: Vec<Point> = self
            .container
            .analysis
            .engine(&loaded.forest)
            .forest_stats()
            .hull
            .into_iter()
            .map(|p| Point::new(p.x * ps, p.y * ps))
            .collect();
        debug!("hull: {} vertices", hull.len());
        if self.format == OutputFormat::Json {
            return emit_json(&hull);
        }

        let table: Vec<Vec<String>> = hull.iter().map(|p| vec![self.n(p.x), self.n(p.y)]).collect();
        output::table(&["x", "y"], &table);
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn batch(&self, dir: &Path, recursive: bool) -> CliResult<()> {
        let dir = expand_path(dir);
        if !self.container.fs.is_dir(&dir) {
            return Err(CliError::InvalidArgs(format!("not a directory: {}", dir.display())));
        }
        let report = self.container.analysis.batch(&dir, recursive)?;
        if self.format == OutputFormat::Json {
            return emit_json(&report);
        }

        let table: Vec<Vec<String>> = report
            .analyses
            .iter()
            .map(|a| {
                vec![
                    a.source.display().to_string(),
                    a.roots_created.to_string(),
                    self.n(a.summary.total_length),
                    a.summary.primary_count.to_string(),
                    a.summary.lateral_count.to_string(),
                    self.n(a.summary.convex_hull_area),
                    a.warnings.len().to_string(),
                ]
            })
            .collect();
        output::table(
            &["document", "roots", "length", "primaries", "laterals", "hull_area", "warnings"],
            &table,
        );
        for (path, reason) in &report.failures {
            output::failure(&format!("{}: {}", path.display(), reason));
        }
        Ok(())
    }
}
