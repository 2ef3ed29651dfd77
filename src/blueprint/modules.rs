//! Builders for the modules of the IO submission scenario and the rewrite
//! that swaps its flat folder creation for the four-tier find-or-create flow.

use serde_json::{Value, json};

use super::{FieldEdit, Rewrite};

/// Connection ids and constants referenced by the generated modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlueprintSettings {
    pub postgres_account: u64,
    pub postgres_account_label: String,
    pub drive_connection: u64,
    pub drive_connection_label: String,
    pub sheets_connection: u64,
    pub sheets_connection_label: String,
    pub shared_drive_id: String,
    pub client_projects_folder_id: String,
    pub spreadsheet_id: String,
    pub dashboard_url: String,
}

impl Default for BlueprintSettings {
    fn default() -> Self {
        Self {
            postgres_account: 13330461,
            postgres_account_label: "BitesizeDB (xerothermic-scarlet-cod@europe-north1-001.proxy.sevalla.app:30067/competitive-moccasin-vicuna)"
                .to_string(),
            drive_connection: 9173518,
            drive_connection_label: "My Google Restricted connection (fraser@bitesizebio.com)".to_string(),
            sheets_connection: 8629994,
            sheets_connection_label: "My Google connection (fraser@bitesizebio.com)".to_string(),
            shared_drive_id: "0AB1AZiOLJI_ZUk9PVA".to_string(),
            client_projects_folder_id: "1PURGWZSK1gMTJN7GDYogY1Q0_ohsUkht".to_string(),
            spreadsheet_id: "1tQfpYsQEfpO5XAPzWbkHUJeGWPKITDiSDOhp6GGJ0jA".to_string(),
            dashboard_url: "https://bionic-dashboard-aevhj.kinsta.app/dashboard/3-io-overview?io_reference={{2.`4`}}".to_string(),
        }
    }
}

const TIER3_NAME: &str = concat!(
    "{{if(40.`0` = \"Live Event\"; \"Live Events\"; ",
    "if(40.`0` = \"eBlast\"; \"eBlasts\"; ",
    "if(40.`0` = \"Podcast\"; \"Podcasts\"; ",
    "if(40.`0` = \"Newsletter Banner\"; \"Newsletter Banners\"; ",
    "if(40.`0` = \"Website Banner\"; \"Website Banners\"; ",
    "if(40.`0` = \"Multi-Session Live Event\"; \"Multi-Session Live Events\"; ",
    "if(40.`0` = \"Article\"; \"Articles\"; ",
    "if(40.`0` = \"Ebook\"; \"Ebooks\"; ",
    "if(40.`0` = \"Masterclass\"; \"Masterclasses\"; 40.`0`)))))))))}}",
);

const IO_FOLDER_NAME: &str = "[{{2.`5`}}] {{2.`4`}} {{2.`3`}} {{40.`0`}} ({{32.`Unique ID`}})";
const YEAR_EXPR: &str = "{{formatDate(2.`3`; \"YYYY\")}}";
const TIER1_ID: &str = "{{ifempty(58.tier1_folder_id; 60.id)}}";
const TIER2_ID: &str = "{{ifempty(58.tier2_folder_id; 61.id)}}";
const TIER3_ID: &str = "{{ifempty(59.product_type_folder_id; 63.id)}}";
const TIER4_ID: &str = "{{ifempty(59.year_folder_id; 64.id)}}";

/// Module replaced by the generated subgraph.
pub const FOLDER_MODULE: u64 = 23;
/// Legacy flat Drive folder creation, removed outright.
pub const LEGACY_DRIVE_MODULE: u64 = 12;

/// Filter that passes when any of the OR'd groups of AND conditions holds.
fn filter(name: &str, groups: &[Value]) -> Value {
    json!({ "name": name, "conditions": groups })
}

fn empty(field: &str) -> Value {
    json!([{ "a": field, "b": "", "o": "text:empty" }])
}

fn interface(fields: &[(&str, &str)]) -> Value {
    fields
        .iter()
        .map(|(name, kind)| json!({ "name": name, "type": kind, "label": name }))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn postgres_module(
    settings: &BlueprintSettings,
    id: u64,
    procedure: &str,
    label: &str,
    mapper: Value,
    interface: Value,
    filter: Option<Value>,
    x: i64,
) -> Value {
    let mut module = json!({
        "id": id,
        "module": "postgres:StoredProcedure",
        "version": 2,
        "parameters": {
            "ignore": false,
            "spname": format!("\"public\".\"{procedure}\""),
            "account": settings.postgres_account,
            "isToManageDataInSharedTransaction": true
        },
        "mapper": mapper,
        "metadata": {
            "designer": { "x": x, "y": 300, "name": label },
            "restore": {
                "parameters": {
                    "spname": { "label": format!("public.{procedure}") },
                    "account": {
                        "data": { "scoped": "true", "connection": "postgres" },
                        "label": settings.postgres_account_label
                    }
                }
            },
            "interface": interface
        }
    });
    if let Some(filter) = filter {
        module["filter"] = filter;
    }
    module
}

fn drive_folder_module(
    settings: &BlueprintSettings,
    id: u64,
    label: &str,
    name: &str,
    parent: &str,
    filter: Option<Value>,
    x: i64,
) -> Value {
    let mut module = json!({
        "id": id,
        "module": "google-drive:createAFolder",
        "version": 4,
        "parameters": { "__IMTCONN__": settings.drive_connection },
        "mapper": {
            "name": name,
            "folderId": parent,
            "destination": "team",
            "sharedDrive": settings.shared_drive_id,
            "useDomainAdminAccess": false
        },
        "metadata": {
            "designer": { "x": x, "y": 300, "name": label },
            "restore": {
                "expect": {
                    "folderId": { "mode": "edit", "path": [] },
                    "destination": { "label": "Google Shared Drive" },
                    "sharedDrive": { "mode": "chose", "label": "Bitesize Bio Shared Drive" },
                    "useDomainAdminAccess": { "label": "No" }
                },
                "parameters": {
                    "__IMTCONN__": {
                        "data": { "scoped": "true", "connection": "google-restricted" },
                        "label": settings.drive_connection_label
                    }
                }
            },
            "parameters": [{
                "name": "__IMTCONN__",
                "type": "account:google-restricted",
                "label": "Connection",
                "required": true
            }],
            "expect": [
                { "name": "destination", "type": "select", "label": "New Drive Location",
                  "required": true, "validate": { "enum": ["drive", "share", "team"] } },
                { "name": "useDomainAdminAccess", "type": "select",
                  "label": "Use Domain Admin Access", "required": true,
                  "validate": { "enum": [true, false] } },
                { "name": "name", "type": "text", "label": "New Folder's Name" },
                { "name": "sharedDrive", "type": "select", "label": "Shared Drive", "required": true },
                { "name": "folderId", "type": "folder", "label": "New Folder Location" }
            ]
        }
    });
    if let Some(filter) = filter {
        module["filter"] = filter;
    }
    module
}

fn set_variables_module(id: u64, label: &str, variables: &[(&str, &str)], x: i64) -> Value {
    let entries: Vec<Value> = variables
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    let interface: Vec<Value> = variables
        .iter()
        .map(|(name, _)| json!({ "name": name, "type": "any", "label": name }))
        .collect();

    json!({
        "id": id,
        "module": "util:SetVariables",
        "version": 1,
        "parameters": {},
        "mapper": { "scope": "roundtrip", "variables": entries },
        "metadata": {
            "designer": { "x": x, "y": 300, "name": label },
            "restore": {
                "expect": {
                    "scope": { "label": "One cycle" },
                    "variables": { "items": vec![Value::Null; variables.len()] }
                }
            },
            "expect": [
                {
                    "name": "variables",
                    "spec": [
                        { "name": "name", "type": "text", "label": "Variable name", "required": true },
                        { "name": "value", "type": "any", "label": "Variable value" }
                    ],
                    "type": "array",
                    "label": "Variables"
                },
                {
                    "name": "scope", "type": "select", "label": "Variable lifetime",
                    "required": true, "validate": { "enum": ["roundtrip", "execution"] }
                }
            ],
            "interface": interface
        }
    })
}

fn placeholder_module(id: u64) -> Value {
    json!({
        "id": id,
        "module": "placeholder:Placeholder",
        "version": 1,
        "parameters": {},
        "mapper": {},
        "metadata": { "designer": { "x": 0, "y": 0 } }
    })
}

/// Router with the conditional module on one branch and a pass-through
/// placeholder on the other, so execution continues when the filter fails.
fn guarded(router_id: u64, placeholder_id: u64, module: Value, x: i64) -> Value {
    json!({
        "id": router_id,
        "module": "builtin:BasicRouter",
        "version": 1,
        "parameters": {},
        "mapper": null,
        "metadata": { "designer": { "x": x, "y": 0 } },
        "routes": [
            { "flow": [module] },
            { "flow": [placeholder_module(placeholder_id)] }
        ]
    })
}

fn sheet_write_module(settings: &BlueprintSettings) -> Value {
    json!({
        "id": 68,
        "module": "google-sheets:updateRow",
        "version": 2,
        "parameters": { "__IMTCONN__": settings.sheets_connection },
        "mapper": {
            "from": "share",
            "mode": "select",
            "values": { "4": "{{32.`Unique ID`}}" },
            "sheetId": "Products",
            "rowNumber": "{{17.__ROW_NUMBER__}}",
            "spreadsheetId": format!("/{}", settings.spreadsheet_id),
            "includesHeaders": true,
            "valueInputOption": "USER_ENTERED"
        },
        "metadata": {
            "designer": { "x": 8100, "y": 300, "name": "Write unique ID to Products sheet" },
            "restore": {
                "expect": {
                    "from": { "label": "Shared with me" },
                    "mode": { "label": "Search by path" },
                    "sheetId": { "label": "Products" },
                    "spreadsheetId": { "path": ["IO Submissions"] },
                    "includesHeaders": {
                        "label": "Yes",
                        "nested": [{
                            "name": "values",
                            "spec": [
                                { "name": "0", "type": "text", "label": "Product Type (A)" },
                                { "name": "1", "type": "text", "label": "Product name (B)" },
                                { "name": "2", "type": "text", "label": "Related IO (C)" },
                                { "name": "3", "type": "text", "label": "Company Name (D)" },
                                { "name": "4", "type": "text", "label": "Unique ID (E)" }
                            ],
                            "type": "collection",
                            "label": "Values"
                        }]
                    },
                    "valueInputOption": { "mode": "chose", "label": "User entered" }
                },
                "parameters": {
                    "__IMTCONN__": {
                        "data": { "scoped": "true", "connection": "google" },
                        "label": settings.sheets_connection_label
                    }
                }
            },
            "parameters": [{
                "name": "__IMTCONN__",
                "type": "account:google",
                "label": "Connection",
                "required": true
            }]
        }
    })
}

/// Modules that replace [`FOLDER_MODULE`]: look up stored folder ids, create
/// each missing tier (company, contact, product type, year) behind a router,
/// store the new ids, then create the IO folder and record the product.
///
/// Ids: 57 variables, 58-59 lookups, routers 69-74 guarding 60-65 with
/// placeholders 90-95, then 66-68 unconditionally.
pub fn io_submission_subgraph(settings: &BlueprintSettings) -> Vec<Value> {
    let s = settings;
    vec![
        set_variables_module(
            57,
            "Set Drive folder variables",
            &[("tier3FolderName", TIER3_NAME), ("ioFolderName", IO_FOLDER_NAME)],
            4800,
        ),
        postgres_module(
            s,
            58,
            "get_client_folder_info",
            "Look up client folder IDs",
            json!({ "@01:text": "{{2.`5`}}" }),
            interface(&[
                ("tla", "text"),
                ("client_name", "text"),
                ("primary_contact", "text"),
                ("tier1_folder_id", "text"),
                ("tier2_folder_id", "text"),
            ]),
            None,
            5100,
        ),
        postgres_module(
            s,
            59,
            "get_product_folder_info",
            "Look up product folder IDs",
            json!({
                "@01:text": "{{2.`5`}}",
                "@02:text": "{{40.`0`}}",
                "@03:text": YEAR_EXPR
            }),
            interface(&[("product_type_folder_id", "text"), ("year_folder_id", "text")]),
            None,
            5400,
        ),
        guarded(
            69,
            90,
            drive_folder_module(
                s,
                60,
                "Create Tier 1 (company) folder",
                "[{{58.tla}}] {{58.client_name}}",
                &s.client_projects_folder_id,
                Some(filter("Only if Tier 1 folder missing", &[empty("{{58.tier1_folder_id}}")])),
                5700,
            ),
            5700,
        ),
        guarded(
            70,
            91,
            drive_folder_module(
                s,
                61,
                "Create Tier 2 (contact) folder",
                "[{{2.`5`}}] {{58.primary_contact}}",
                TIER1_ID,
                Some(filter("Only if Tier 2 folder missing", &[empty("{{58.tier2_folder_id}}")])),
                6000,
            ),
            6000,
        ),
        guarded(
            71,
            92,
            postgres_module(
                s,
                62,
                "update_client_folder_ids",
                "Store Tier 1+2 folder IDs",
                json!({
                    "@01:text": "{{2.`5`}}",
                    "@02:text": TIER1_ID,
                    "@03:text": TIER2_ID
                }),
                interface(&[("update_client_folder_ids", "boolean")]),
                Some(filter(
                    "Only if Tier 1 or Tier 2 was missing",
                    &[empty("{{58.tier1_folder_id}}"), empty("{{58.tier2_folder_id}}")],
                )),
                6300,
            ),
            6300,
        ),
        guarded(
            72,
            93,
            drive_folder_module(
                s,
                63,
                "Create Tier 3 (product type) folder",
                "[{{2.`5`}}] {{57.tier3FolderName}}",
                TIER2_ID,
                Some(filter(
                    "Only if Tier 3 folder missing",
                    &[empty("{{59.product_type_folder_id}}")],
                )),
                6600,
            ),
            6600,
        ),
        guarded(
            73,
            94,
            drive_folder_module(
                s,
                64,
                "Create Tier 4 (year) folder",
                YEAR_EXPR,
                TIER3_ID,
                Some(filter("Only if Tier 4 folder missing", &[empty("{{59.year_folder_id}}")])),
                6900,
            ),
            6900,
        ),
        guarded(
            74,
            95,
            postgres_module(
                s,
                65,
                "upsert_product_folder",
                "Store Tier 3+4 folder IDs",
                json!({
                    "@01:text": "{{2.`5`}}",
                    "@02:text": "{{40.`0`}}",
                    "@03:text": YEAR_EXPR,
                    "@04:text": TIER3_ID,
                    "@05:text": TIER4_ID
                }),
                interface(&[("upsert_product_folder", "text")]),
                Some(filter(
                    "Only if Tier 3 or Tier 4 was missing",
                    &[empty("{{59.product_type_folder_id}}"), empty("{{59.year_folder_id}}")],
                )),
                7200,
            ),
            7200,
        ),
        drive_folder_module(s, 66, "Create IO folder", IO_FOLDER_NAME, TIER4_ID, None, 7500),
        postgres_module(
            s,
            67,
            "upsert_io_product",
            "Record product in DB",
            json!({
                "@01:text": "{{2.`4`}}",
                "@02:text": "{{40.`0`}}",
                "@03:text": "{{40.`1`}}",
                "@04:text": "{{32.`Unique ID`}}",
                "@05:text": "{{66.id}}"
            }),
            interface(&[("upsert_io_product", "integer")]),
            None,
            7800,
        ),
        sheet_write_module(s),
    ]
}

/// The full edit of the IO submission scenario.
///
/// The scenario's existing router placeholders use ids 65 and 66, which the
/// inserted modules also use, so they are moved to 80 and 81.
pub fn io_submission_rewrite(settings: &BlueprintSettings) -> Rewrite {
    let mut rewrite = Rewrite::default();
    rewrite.renames.insert(65, 80);
    rewrite.renames.insert(66, 81);
    rewrite.removals.insert(LEGACY_DRIVE_MODULE);
    rewrite.edits = vec![
        (10, FieldEdit::remove(&["mapper", "values", "18"])),
        (54, FieldEdit::set(&["mapper", "@03:text"], settings.dashboard_url.as_str())),
        (41, FieldEdit::set(&["mapper", "value"], "- {{40.`0`}}")),
        (
            47,
            FieldEdit::append_text(
                &["mapper", "data", "notes"],
                format!("\n\nFull IO details: {}", settings.dashboard_url),
            ),
        ),
    ];
    rewrite.replacement = Some((FOLDER_MODULE, io_submission_subgraph(settings)));
    rewrite
}
