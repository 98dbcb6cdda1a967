use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};

use crate::core::backend::Outcome;
use crate::core::validation::{
    DEFAULT_MAX_INPUT_LEN, ValidationError, require_credential, require_range, require_snowflake,
    require_webhook_url, sanitize_input,
};
use crate::core::vault::Credential;

/// Default pause between message requests, in milliseconds.
pub const MESSAGE_DELAY_MS: u64 = 1000;

/// Stand-in user id for the avatar grabber meaning "the token's own account".
pub const SELF_USER_ID: &str = "@me";

static MESSAGE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([0-9]+)\s+messages?\b").unwrap());

static MEMBER_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([0-9]+)\s+members?\b").unwrap());

/// Result phrases the token checker uses for a dead token. The backend answers in Turkish.
const DEAD_TOKEN_MARKERS: &[&str] = &["invalid", "expired", "geçersiz", "süresi dolmuş"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Snowflake,
    /// A snowflake, or `@me` for the token's own account.
    UserId,
    WebhookUrl,
    Count { min: u64, max: u64, default: u64 },
    /// Milliseconds between requests.
    Delay { default_ms: u64 },
    Flag { default: bool },
    Text,
    Choice {
        options: &'static [&'static str],
        default: &'static str,
    },
    /// Numeric choice, sent as a number.
    Size {
        options: &'static [u64],
        default: u64,
    },
}

/// Where a field lands in the argument bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Top,
    Options,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Form name, used as `--name` on the command line.
    pub name: &'static str,
    /// Key in the argument bag.
    pub arg: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub placement: Placement,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsEncoding {
    Object,
    JsonString,
}

/// An operation that stays in effect after its start call returns, until a stop call.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub stop_command: &'static str,
    pub started: &'static str,
    pub stopped: &'static str,
}

#[derive(Debug)]
pub struct OperationKind {
    pub name: &'static str,
    pub title: &'static str,
    pub command: &'static str,
    pub channel: Option<&'static str>,
    pub cancel_command: Option<&'static str>,
    pub uses_credential: bool,
    pub fields: &'static [FieldSpec],
    pub options_encoding: OptionsEncoding,
    /// Captures the processed count in a result message, e.g. `Deleted 12 messages`.
    pub count_pattern: Option<&'static LazyLock<Regex>>,
    /// Lowercase phrases that turn an otherwise successful result into an error.
    pub failure_markers: &'static [&'static str],
    pub session: Option<Session>,
}

impl OperationKind {
    const BASE: OperationKind = OperationKind {
        name: "",
        title: "",
        command: "",
        channel: None,
        cancel_command: None,
        uses_credential: true,
        fields: &[],
        options_encoding: OptionsEncoding::Object,
        count_pattern: None,
        failure_markers: &[],
        session: None,
    };
}

const fn field(
    name: &'static str,
    arg: &'static str,
    label: &'static str,
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec {
        name,
        arg,
        label,
        kind,
        placement: Placement::Top,
        required: true,
    }
}

/// A top-level field that may be left out.
const fn optional(
    name: &'static str,
    arg: &'static str,
    label: &'static str,
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec {
        required: false,
        ..field(name, arg, label, kind)
    }
}

const fn option(
    name: &'static str,
    arg: &'static str,
    label: &'static str,
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec {
        name,
        arg,
        label,
        kind,
        placement: Placement::Options,
        required: false,
    }
}

const fn flag(name: &'static str, arg: &'static str, label: &'static str, default: bool) -> FieldSpec {
    option(name, arg, label, FieldKind::Flag { default })
}

pub static CATALOG: &[OperationKind] = &[
    OperationKind {
        name: "bulk-delete",
        title: "Bulk Delete",
        command: "bulk_delete_messages",
        channel: Some("bulk-delete-log"),
        fields: &[
            field("channel", "channelId", "Channel ID", FieldKind::Snowflake),
            optional(
                "limit",
                "limit",
                "Message limit",
                FieldKind::Count { min: 1, max: 100, default: 50 },
            ),
            optional(
                "delay",
                "delayMs",
                "Delay (ms)",
                FieldKind::Delay { default_ms: MESSAGE_DELAY_MS },
            ),
        ],
        count_pattern: Some(&MESSAGE_COUNT),
        ..OperationKind::BASE
    },
    OperationKind {
        name: "purge-channel",
        title: "Channel Purge",
        command: "purge_channel",
        channel: Some("purge-log"),
        fields: &[
            field("channel", "channelId", "Channel ID", FieldKind::Snowflake),
            optional(
                "count",
                "messageCount",
                "Message count",
                FieldKind::Count { min: 1, max: 10_000, default: 100 },
            ),
        ],
        count_pattern: Some(&MESSAGE_COUNT),
        ..OperationKind::BASE
    },
    OperationKind {
        name: "clone-messages",
        title: "Message Cloner",
        command: "clone_messages",
        channel: Some("message-clone-log"),
        cancel_command: Some("cancel_message_clone"),
        fields: &[
            field("source", "sourceChannelId", "Source channel ID", FieldKind::Snowflake),
            field("webhook", "webhookUrl", "Target webhook URL", FieldKind::WebhookUrl),
            option(
                "limit",
                "messageLimit",
                "Message limit",
                FieldKind::Count { min: 1, max: 1000, default: 50 },
            ),
            option(
                "delay",
                "delayMs",
                "Delay (ms)",
                FieldKind::Delay { default_ms: MESSAGE_DELAY_MS },
            ),
            flag("embeds", "cloneEmbeds", "Clone embeds", true),
            flag("attachments", "cloneAttachments", "Clone attachments", true),
            flag("skip-bots", "skipBots", "Skip bot messages", true),
            flag(
                "only-attachments",
                "onlyWithAttachments",
                "Only messages with attachments",
                false,
            ),
        ],
        count_pattern: Some(&MESSAGE_COUNT),
        ..OperationKind::BASE
    },
    OperationKind {
        name: "live-clone",
        title: "Live Message Cloner",
        command: "start_live_message_cloner",
        channel: Some("message-clone-log"),
        fields: &[
            field("source", "sourceChannelId", "Source channel ID", FieldKind::Snowflake),
            field("webhook", "webhookUrl", "Target webhook URL", FieldKind::WebhookUrl),
        ],
        session: Some(Session {
            stop_command: "stop_live_message_cloner",
            started: "Live cloner started",
            stopped: "Live cloner stopped",
        }),
        ..OperationKind::BASE
    },
    OperationKind {
        name: "scrape-members",
        title: "Member Scraper",
        command: "scrape_guild_members",
        channel: Some("member-scraper-log"),
        cancel_command: Some("cancel_member_scraper"),
        fields: &[
            field("guild", "guildId", "Server ID", FieldKind::Snowflake),
            flag("roles", "includeRoles", "Include roles", true),
            flag("bots", "includeBots", "Include bots", false),
            flag("status", "includeStatus", "Include status", false),
            option(
                "format",
                "exportFormat",
                "Export format",
                FieldKind::Choice {
                    options: &["json", "csv", "txt"],
                    default: "json",
                },
            ),
        ],
        count_pattern: Some(&MEMBER_COUNT),
        ..OperationKind::BASE
    },
    OperationKind {
        name: "clone-server",
        title: "Server Cloner",
        command: "clone_discord_server",
        channel: Some("discord-clone-log"),
        cancel_command: Some("cancel_discord_clone"),
        fields: &[
            field("source", "sourceServerId", "Source server ID", FieldKind::Snowflake),
            field("target", "targetServerId", "Target server ID", FieldKind::Snowflake),
            flag("name", "serverName", "Server name", true),
            flag("icon", "serverIcon", "Server icon", true),
            flag("roles", "roles", "Roles", true),
            flag("channels", "channels", "Channels", true),
            flag("emojis", "emojis", "Emojis", false),
            flag("permissions", "channelPermissions", "Channel permissions", false),
        ],
        ..OperationKind::BASE
    },
    OperationKind {
        name: "clone-role",
        title: "Role Cloner",
        command: "clone_role",
        fields: &[
            field("guild", "guildId", "Server ID", FieldKind::Snowflake),
            field("role", "sourceRoleId", "Source role ID", FieldKind::Snowflake),
            field("name", "newRoleName", "New role name", FieldKind::Text),
        ],
        ..OperationKind::BASE
    },
    OperationKind {
        name: "backup-server",
        title: "Server Backup",
        command: "backup_guild",
        channel: Some("server-backup-log"),
        fields: &[
            field("guild", "guildId", "Server ID", FieldKind::Snowflake),
            flag("channels", "includeChannels", "Channels", true),
            flag("roles", "includeRoles", "Roles", true),
            flag("emojis", "includeEmojis", "Emojis", true),
            flag("settings", "includeSettings", "Settings", true),
            flag("permissions", "includePermissions", "Permissions", true),
        ],
        options_encoding: OptionsEncoding::JsonString,
        ..OperationKind::BASE
    },
    OperationKind {
        name: "restore-server",
        title: "Server Restore",
        command: "restore_guild",
        channel: Some("server-backup-log"),
        fields: &[
            field("guild", "guildId", "Server ID", FieldKind::Snowflake),
            field("path", "backupPath", "Backup file", FieldKind::Text),
        ],
        ..OperationKind::BASE
    },
    OperationKind {
        name: "delete-webhook",
        title: "Webhook Deleter",
        command: "delete_webhook",
        uses_credential: false,
        fields: &[field("webhook", "webhookUrl", "Webhook URL", FieldKind::WebhookUrl)],
        ..OperationKind::BASE
    },
    OperationKind {
        name: "change-nickname",
        title: "Nickname Changer",
        command: "change_nickname",
        fields: &[
            field("guild", "guildId", "Server ID", FieldKind::Snowflake),
            field("nickname", "nickname", "Nickname", FieldKind::Text),
        ],
        ..OperationKind::BASE
    },
    OperationKind {
        name: "hypesquad",
        title: "HypeSquad Changer",
        command: "change_hypesquad_house",
        fields: &[optional(
            "house",
            "house",
            "House",
            FieldKind::Choice {
                options: &["bravery", "brilliance", "balance"],
                default: "bravery",
            },
        )],
        ..OperationKind::BASE
    },
    OperationKind {
        name: "leave-hypesquad",
        title: "HypeSquad Leave",
        command: "leave_hypesquad",
        ..OperationKind::BASE
    },
    OperationKind {
        name: "custom-rpc",
        title: "Custom Rich Presence",
        command: "set_discord_rpc",
        uses_credential: false,
        fields: &[
            optional("app", "appId", "Application ID", FieldKind::Snowflake),
            optional("details", "details", "Details", FieldKind::Text),
            optional("state", "state", "State", FieldKind::Text),
            optional("large-image", "largeImageKey", "Large image key", FieldKind::Text),
            optional("large-text", "largeImageText", "Large image text", FieldKind::Text),
            optional("small-image", "smallImageKey", "Small image key", FieldKind::Text),
            optional("small-text", "smallImageText", "Small image text", FieldKind::Text),
            optional("button-label", "buttonLabel", "Button label", FieldKind::Text),
            optional("button-url", "buttonUrl", "Button URL", FieldKind::Text),
        ],
        session: Some(Session {
            stop_command: "clear_discord_rpc",
            started: "Rich presence set",
            stopped: "Rich presence cleared",
        }),
        ..OperationKind::BASE
    },
    OperationKind {
        name: "check-token",
        title: "Token Checker",
        command: "check_token",
        failure_markers: DEAD_TOKEN_MARKERS,
        ..OperationKind::BASE
    },
    OperationKind {
        name: "grab-avatar",
        title: "Avatar Grabber",
        command: "grab_avatar",
        fields: &[
            optional("user", "userId", "User ID", FieldKind::UserId),
            optional(
                "size",
                "size",
                "Size",
                FieldKind::Size {
                    options: &[128, 256, 512, 1024, 2048],
                    default: 512,
                },
            ),
        ],
        ..OperationKind::BASE
    },
    OperationKind {
        name: "token-info",
        title: "Token Info",
        command: "get_token_info",
        ..OperationKind::BASE
    },
];

/// Look up an operation by CLI name or backend command.
pub fn find(name: &str) -> Option<&'static OperationKind> {
    CATALOG
        .iter()
        .find(|op| op.name == name || op.command == name)
}

impl FieldSpec {
    fn parse(&self, raw: Option<&str>) -> Result<Value, ValidationError> {
        let raw = raw.map(str::trim).filter(|v| !v.is_empty());
        let Some(raw) = raw else {
            if self.required {
                return Err(ValidationError::Missing(self.label));
            }
            return Ok(self.default_value());
        };

        let value = match self.kind {
            FieldKind::Snowflake => {
                require_snowflake(self.label, raw)?;
                Value::String(raw.to_string())
            }
            FieldKind::UserId if raw == SELF_USER_ID => Value::String(raw.to_string()),
            FieldKind::UserId => {
                require_snowflake(self.label, raw)?;
                Value::String(raw.to_string())
            }
            FieldKind::WebhookUrl => {
                let parts = require_webhook_url(self.label, raw)?;
                Value::String(format!(
                    "https://discord.com/api/webhooks/{}/{}",
                    parts.id, parts.token
                ))
            }
            FieldKind::Count { min, max, .. } => json!(require_range(self.label, raw, min, max)?),
            FieldKind::Delay { .. } => json!(require_range(self.label, raw, 0, 60_000)?),
            FieldKind::Flag { .. } => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Value::Bool(true),
                "false" | "no" | "off" | "0" => Value::Bool(false),
                _ => return Err(ValidationError::NotAFlag(self.label)),
            },
            FieldKind::Text => Value::String(sanitize_input(raw, DEFAULT_MAX_INPUT_LEN)),
            FieldKind::Choice { options, .. } => {
                let lowered = raw.to_ascii_lowercase();
                if !options.contains(&lowered.as_str()) {
                    return Err(ValidationError::NotAChoice {
                        field: self.label,
                        options: options.join(", "),
                    });
                }
                Value::String(lowered)
            }
            FieldKind::Size { options, .. } => {
                let size = raw.parse::<u64>().ok().filter(|n| options.contains(n));
                match size {
                    Some(size) => json!(size),
                    None => {
                        return Err(ValidationError::NotAChoice {
                            field: self.label,
                            options: options
                                .iter()
                                .map(u64::to_string)
                                .collect::<Vec<_>>()
                                .join(", "),
                        });
                    }
                }
            }
        };
        Ok(value)
    }

    /// Value sent for an optional field left blank. Blank fields are still sent.
    fn default_value(&self) -> Value {
        match self.kind {
            FieldKind::Count { default, .. } => json!(default),
            FieldKind::Delay { default_ms } => json!(default_ms),
            FieldKind::Flag { default } => Value::Bool(default),
            FieldKind::Choice { default, .. } => Value::String(default.to_string()),
            FieldKind::Size { default, .. } => json!(default),
            FieldKind::UserId => Value::String(SELF_USER_ID.to_string()),
            FieldKind::Text => Value::String(String::new()),
            FieldKind::Snowflake | FieldKind::WebhookUrl => Value::Null,
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self.kind, FieldKind::Flag { .. })
    }
}

impl OperationKind {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate the form and assemble the argument bag. Nothing here touches the backend.
    pub fn build_args(
        &self,
        credential: Option<&Credential>,
        form: &HashMap<String, String>,
    ) -> Result<Value, ValidationError> {
        let mut args = Map::new();
        let mut options = Map::new();

        if self.uses_credential {
            let credential = credential.ok_or(ValidationError::Missing("Credential"))?;
            require_credential(credential.expose())?;
            args.insert("userToken".into(), Value::String(credential.expose().to_string()));
        }

        for spec in self.fields {
            let value = spec.parse(form.get(spec.name).map(String::as_str))?;
            match spec.placement {
                Placement::Top => args.insert(spec.arg.to_string(), value),
                Placement::Options => options.insert(spec.arg.to_string(), value),
            };
        }

        if !options.is_empty() {
            let options = Value::Object(options);
            let encoded = match self.options_encoding {
                OptionsEncoding::Object => options,
                OptionsEncoding::JsonString => Value::String(options.to_string()),
            };
            args.insert("options".into(), encoded);
        }
        Ok(Value::Object(args))
    }

    /// Processed count reported by the outcome, falling back to the message text.
    pub fn processed_count(&self, outcome: &Outcome) -> Option<u64> {
        if outcome.processed.is_some() {
            return outcome.processed;
        }
        let pattern = self.count_pattern?;
        pattern.captures(&outcome.message)?.get(1)?.as_str().parse().ok()
    }

    /// The result text carries one of the operation's failure phrases.
    pub fn reports_failure(&self, outcome: &Outcome) -> bool {
        if self.failure_markers.is_empty() {
            return false;
        }
        let message = outcome.message.to_lowercase();
        self.failure_markers.iter().any(|m| message.contains(m))
    }

    /// A call that succeeded but did no work.
    pub fn is_zero_effect(&self, outcome: &Outcome) -> bool {
        self.processed_count(outcome) == Some(0)
    }

    /// Whether a successful call should still settle as an error.
    pub fn rejects(&self, outcome: &Outcome) -> bool {
        self.is_zero_effect(outcome) || self.reports_failure(outcome)
    }
}
