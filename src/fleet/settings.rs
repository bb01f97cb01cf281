//! Leaf settings and the fleet status view, over the command channel.
//!
//! Settings travel as `{common: {address, branch}, custom: {...}}`. Reads of
//! an existing leaf also carry a `template` describing the editable fields.

use forest_common::CommandRequest;
use serde_json::Value;

use super::reconciler::{Fleet, MutationOutcome};
use crate::errors::FleetError;

impl Fleet {
    /// `get_leaf_settings`: current values plus their `template`.
    pub async fn leaf_settings(&self, leaf_id: &str) -> Result<Value, FleetError> {
        let request = CommandRequest::new("get_leaf_settings").arg("leaf_id", leaf_id);
        self.settings_field(request).await
    }

    /// `get_default_settings`: the settings template for a new leaf of a species.
    pub async fn default_settings(&self, species_id: &str) -> Result<Value, FleetError> {
        let request = CommandRequest::new("get_default_settings").arg("specie_id", species_id);
        self.settings_field(request).await
    }

    /// `set_leaf_settings`, then refresh. Address and branch changes show up
    /// in the leaf list.
    pub async fn save_leaf_settings(
        &self,
        leaf_id: &str,
        settings: Value,
    ) -> Result<MutationOutcome, FleetError> {
        if !settings.get("common").is_some_and(Value::is_object) {
            return Err(FleetError::MalformedPayload {
                field: "settings".to_string(),
                message: "expected an object with a `common` section".to_string(),
            });
        }
        let request = CommandRequest::new("set_leaf_settings")
            .arg("leaf_id", leaf_id)
            .arg("settings", settings);
        self.mutate(request).await
    }

    /// `forest_status`: one entry per server the backend knows about.
    pub async fn status(&self) -> Result<Vec<Value>, FleetError> {
        let response = self
            .dispatcher()
            .send_ok(CommandRequest::new("forest_status"))
            .await?;
        match response.get("servers") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(servers)) => Ok(servers.clone()),
            Some(Value::Object(servers)) => Ok(servers.values().cloned().collect()),
            Some(other) => Err(FleetError::MalformedPayload {
                field: "servers".to_string(),
                message: format!("expected a list, got {other}"),
            }),
        }
    }

    async fn settings_field(&self, request: CommandRequest) -> Result<Value, FleetError> {
        let response = self.dispatcher().send_ok(request).await?;
        response
            .get("settings")
            .cloned()
            .ok_or_else(|| FleetError::MalformedPayload {
                field: "settings".to_string(),
                message: "missing".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::dispatch::testing::{Scripted, ScriptedTransport};
    use crate::errors::ChannelError;
    use crate::fleet::RefreshOutcome;
    use forest_common::CommandResponse;
    use serde_json::json;

    #[tokio::test]
    async fn leaf_settings_returns_values_and_template() {
        let transport = ScriptedTransport::new(vec![Scripted::Respond(
            CommandResponse::success().with(
                "settings",
                json!({
                    "custom": {"workers": 2},
                    "common": {"address": ["a.example.com"], "branch": []},
                    "template": {"custom": {"workers": {"type": "int"}}}
                }),
            ),
        )]);
        let fleet = Fleet::new(Dispatcher::new(transport.clone()));

        let settings = fleet.leaf_settings("id-main").await.unwrap();
        assert_eq!(settings["custom"]["workers"], 2);
        assert_eq!(settings["template"]["custom"]["workers"]["type"], "int");

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].function, "get_leaf_settings");
        assert_eq!(sent[0].args["leaf_id"], "id-main");
    }

    #[tokio::test]
    async fn default_settings_keys_on_species() {
        let transport = ScriptedTransport::new(vec![Scripted::Respond(
            CommandResponse::success().with("settings", json!({"common": {}, "custom": {}})),
        )]);
        let fleet = Fleet::new(Dispatcher::new(transport.clone()));

        fleet.default_settings("species-1").await.unwrap();
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].function, "get_default_settings");
        assert_eq!(sent[0].args["specie_id"], "species-1");
    }

    #[tokio::test]
    async fn missing_settings_payload_is_malformed() {
        let transport = ScriptedTransport::new(vec![Scripted::Respond(CommandResponse::success())]);
        let fleet = Fleet::new(Dispatcher::new(transport));

        let err = fleet.leaf_settings("id-main").await.unwrap_err();
        assert!(
            matches!(err, FleetError::MalformedPayload { ref field, .. } if field == "settings")
        );
    }

    #[tokio::test]
    async fn saving_settings_refreshes_fleet() {
        let transport = ScriptedTransport::new(vec![
            Scripted::Respond(CommandResponse::success()),
            Scripted::Respond(CommandResponse::success().with("leaves", json!([{"name": "main"}]))),
        ]);
        let fleet = Fleet::new(Dispatcher::new(transport.clone()));

        let settings = json!({
            "common": {"address": ["b.example.com"], "branch": []},
            "custom": {}
        });
        let outcome = fleet.save_leaf_settings("id-main", settings).await.unwrap();
        assert_eq!(
            outcome,
            MutationOutcome::Done(RefreshOutcome::Applied { seq: 1, count: 1 })
        );
        assert_eq!(
            transport.sent_functions(),
            vec!["set_leaf_settings", "get_leaves"]
        );
    }

    #[tokio::test]
    async fn settings_without_common_section_are_not_sent() {
        let transport = ScriptedTransport::new(vec![]);
        let fleet = Fleet::new(Dispatcher::new(transport.clone()));

        let err = fleet
            .save_leaf_settings("id-main", json!({"workers": 4}))
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::MalformedPayload { .. }));
        assert!(transport.sent_functions().is_empty());
    }

    #[tokio::test]
    async fn status_lists_servers() {
        let transport = ScriptedTransport::new(vec![
            Scripted::Respond(
                CommandResponse::success()
                    .with("servers", json!([{"name": "trunk", "state": "up"}])),
            ),
            Scripted::Respond(CommandResponse::failure("error")),
        ]);
        let fleet = Fleet::new(Dispatcher::new(transport));

        let servers = fleet.status().await.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0]["name"], "trunk");

        let err = fleet.status().await.unwrap_err();
        assert!(matches!(err, FleetError::Channel(ChannelError::Domain { .. })));
    }
}
