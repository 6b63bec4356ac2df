//! Command-line parsing and command dispatch for the `calcstore` binary.

use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    config::{Database, StoreConfig},
    entity::{Entity, EntityKind, NodeUpdate},
    errors::CalcStoreError,
    integrity::run_chain_checks,
    ordered::{OrderedList, Relation, RelationKind},
    store::CalcStore,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLineConfig {
    pub database: String,
    pub without_migrations: bool,
    pub command: String,
    pub command_args: Vec<String>,
}

impl CommandLineConfig {
    pub fn from_args(args: &[&str]) -> Result<Self, String> {
        let mut database = String::from("memory");
        let mut without_migrations = false;
        let mut command = String::from("status");
        let mut command_args = Vec::new();
        let mut command_set = false;
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            if command_set {
                command_args.push(arg.to_string());
                continue;
            }
            match *arg {
                "--db" | "--database" => {
                    database = iter
                        .next()
                        .ok_or_else(|| "--db requires a value".to_string())?
                        .to_string();
                }
                "--without-migrations" => without_migrations = true,
                "--command" => {
                    command = iter
                        .next()
                        .ok_or_else(|| "--command requires a value".to_string())?
                        .to_string();
                    command_set = true;
                }
                other if other.starts_with('-') => {
                    return Err(format!("unknown flag {other}"));
                }
                _ => {
                    command = arg.to_string();
                    command_set = true;
                }
            }
        }
        Ok(Self {
            database,
            without_migrations,
            command,
            command_args,
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            database: Database::parse(&self.database),
            without_migrations: self.without_migrations,
            ..StoreConfig::default()
        }
    }

    pub fn help() -> &'static str {
        "Usage: calcstore [--db memory|PATH] [--without-migrations] <command> [args]\n\
         \n\
         Commands:\n\
         \x20 status\n\
         \x20 check\n\
         \x20 migrate [--dry-run]\n\
         \x20 create-calculation --name NAME\n\
         \x20 create-formular --name NAME\n\
         \x20 create-node --name NAME [--data DATA]\n\
         \x20 list-calculations | list-formulars | list-nodes\n\
         \x20 get-KIND --id ID\n\
         \x20 update-KIND --id ID [--name NAME] [--data DATA]\n\
         \x20 delete-KIND --id ID\n\
         \x20 attach  --relation R --parent P --child C [--next RECORD]\n\
         \x20 detach  --relation R --parent P --child C\n\
         \x20 read    --relation R --parent P [--expand]\n\
         \x20 reorder --relation R --parent P --order C1,C2,...\n\
         \n\
         Kinds: calculation, formular, node\n\
         Relations: calculation-formulars, formular-nodes\n"
    }
}

/// Flag lookup over the arguments that follow the command name.
struct CommandArgs<'a> {
    args: &'a [String],
}

impl<'a> CommandArgs<'a> {
    fn new(args: &'a [String]) -> Self {
        Self { args }
    }

    fn value(&self, flag: &str) -> Option<&'a str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }

    fn has(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| arg == flag)
    }

    fn required(&self, flag: &str) -> Result<&'a str, CalcStoreError> {
        self.value(flag)
            .ok_or_else(|| CalcStoreError::invalid_input(format!("{flag} requires a value")))
    }

    fn id(&self, flag: &str) -> Result<i64, CalcStoreError> {
        parse_id(flag, self.required(flag)?)
    }

    fn optional_id(&self, flag: &str) -> Result<Option<i64>, CalcStoreError> {
        self.value(flag).map(|raw| parse_id(flag, raw)).transpose()
    }

    fn id_list(&self, flag: &str) -> Result<Vec<i64>, CalcStoreError> {
        let raw = self.required(flag)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        raw.split(',').map(|part| parse_id(flag, part.trim())).collect()
    }

    fn relation(&self) -> Result<RelationKind, CalcStoreError> {
        self.required("--relation")?.parse()
    }
}

fn parse_id(flag: &str, raw: &str) -> Result<i64, CalcStoreError> {
    raw.parse::<i64>().map_err(|_| {
        CalcStoreError::invalid_input(format!("{flag} expects an integer id, got {raw}"))
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CalcStoreError> {
    serde_json::to_value(value).map_err(|e| CalcStoreError::query(e.to_string()))
}

/// Runs `command` against `store` and returns its JSON result.
pub fn execute(
    store: &CalcStore,
    command: &str,
    args: &[String],
) -> Result<Value, CalcStoreError> {
    let args = CommandArgs::new(args);
    match command {
        "status" => Ok(json!({
            "schemaVersion": store.schema_version()?,
            "calculations": store.list_calculations()?.len(),
            "formulars": store.list_formulars()?.len(),
            "nodes": store.list_nodes()?.len(),
            "relations": RelationKind::ALL,
        })),
        "check" => {
            let report = run_chain_checks(store)?;
            Ok(json!({
                "ok": !report.has_issues(),
                "report": to_json(&report)?,
            }))
        }
        "migrate" => {
            let report = store.run_pending_migrations(args.has("--dry-run"))?;
            Ok(json!({
                "fromVersion": report.from_version,
                "toVersion": report.to_version,
                "statements": report.statements,
                "dryRun": report.dry_run,
            }))
        }
        "create-calculation" => to_json(&store.create_calculation(args.required("--name")?)?),
        "create-formular" => to_json(&store.create_formular(args.required("--name")?)?),
        "create-node" => to_json(&store.create_node(
            args.required("--name")?,
            args.value("--data").unwrap_or(""),
        )?),
        "list-calculations" => to_json(&store.list_calculations()?),
        "list-formulars" => to_json(&store.list_formulars()?),
        "list-nodes" => to_json(&store.list_nodes()?),
        "attach" | "detach" | "read" | "reorder" => match args.relation()? {
            RelationKind::CalculationFormulars => {
                chain_command(&store.calculation_formulars(), command, &args)
            }
            RelationKind::FormularNodes => chain_command(&store.formular_nodes(), command, &args),
        },
        other => match other.split_once('-') {
            Some((verb @ ("get" | "update" | "delete"), kind)) => {
                entity_command(store, verb, kind.parse()?, &args)
            }
            _ => Err(CalcStoreError::invalid_input(format!(
                "unknown command {other}"
            ))),
        },
    }
}

/// `get-*`, `update-*` and `delete-*` for one entity kind, addressed by `--id`.
fn entity_command(
    store: &CalcStore,
    verb: &str,
    kind: EntityKind,
    args: &CommandArgs<'_>,
) -> Result<Value, CalcStoreError> {
    let id = args.id("--id")?;
    match (verb, kind) {
        ("get", EntityKind::Calculation) => to_json(&store.get_calculation(id)?),
        ("get", EntityKind::Formular) => to_json(&store.get_formular(id)?),
        ("get", EntityKind::Node) => to_json(&store.get_node(id)?),
        ("update", EntityKind::Calculation) => {
            to_json(&store.update_calculation(id, args.value("--name"))?)
        }
        ("update", EntityKind::Formular) => {
            to_json(&store.update_formular(id, args.value("--name"))?)
        }
        ("update", EntityKind::Node) => {
            let update = NodeUpdate {
                name: args.value("--name").map(str::to_string),
                node_data: args.value("--data").map(str::to_string),
            };
            to_json(&store.update_node(id, &update)?)
        }
        ("delete", _) => {
            match kind {
                EntityKind::Calculation => store.delete_calculation(id)?,
                EntityKind::Formular => store.delete_formular(id)?,
                EntityKind::Node => store.delete_node(id)?,
            }
            Ok(json!({ "deleted": id, "kind": kind }))
        }
        (other, _) => Err(CalcStoreError::invalid_input(format!(
            "unknown command {other}-{kind}"
        ))),
    }
}

fn chain_command<R>(
    list: &OrderedList<'_, R>,
    command: &str,
    args: &CommandArgs<'_>,
) -> Result<Value, CalcStoreError>
where
    R: Relation,
    R::Child: Serialize,
{
    let parent = args.id("--parent")?;
    match command {
        "attach" => {
            let record = list.attach(parent, args.id("--child")?, args.optional_id("--next")?)?;
            to_json(&record)
        }
        "detach" => {
            let child = args.id("--child")?;
            list.detach(parent, child)?;
            Ok(json!({ "detached": child, "parent": parent }))
        }
        "read" if args.has("--expand") => to_json(&list.read_expanded(parent)?),
        "read" => to_json(&list.read(parent)?),
        "reorder" => to_json(&list.reorder(parent, &args.id_list("--order")?)?),
        other => Err(CalcStoreError::invalid_input(format!(
            "{other} is not a chain command for {}",
            <R::Parent as Entity>::KIND
        ))),
    }
}
