use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use indexmap::IndexSet;
use serde_json::{json, Value};

use crate::common::is_built_in;
use crate::coordinators::CampaignEvent;
use crate::error::{AuthoringError, Warning};
use crate::schema::Schema;

/// The campaign document being built. Events keep the order they were added in.
#[derive(Debug, Default)]
pub struct Campaign {
    events: Vec<CampaignEvent>,
    custom_events: IndexSet<String>,
    schema: Option<Schema>,
    warnings: Vec<Warning>,
}

impl Campaign {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A campaign whose events are validated against `schema` as they are added.
    #[must_use]
    pub fn with_schema(schema: Schema) -> Self {
        Campaign {
            schema: Some(schema),
            ..Self::default()
        }
    }

    /// Declares event names the campaign may broadcast or listen for besides the
    /// built-in ones.
    ///
    /// # Errors
    /// If a name is empty.
    pub fn add_custom_events<I, S>(&mut self, names: I) -> Result<&mut Self, AuthoringError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                return Err(AuthoringError::configuration(
                    "A custom event name must not be empty.",
                ));
            }
            self.custom_events.insert(name.to_string());
        }
        Ok(self)
    }

    #[must_use]
    pub fn is_known_event(&self, event: &str) -> bool {
        is_built_in(event) || self.custom_events.contains(event)
    }

    #[must_use]
    pub fn custom_events(&self) -> &IndexSet<String> {
        &self.custom_events
    }

    /// Appends `event` after checking that every event it references is known and,
    /// with a schema, that every emitted object is schema-valid. Warnings raised by
    /// the event's coordinator are kept on the campaign.
    ///
    /// # Errors
    /// - If the event references an event name that is neither built in nor custom
    /// - Any schema violation, see [`Schema::validate`]
    pub fn add(&mut self, event: CampaignEvent) -> Result<&mut Self, AuthoringError> {
        if let Some(unknown) = event
            .coordinator
            .event_references()
            .into_iter()
            .find(|name| !self.is_known_event(name))
        {
            return Err(AuthoringError::configuration(format!(
                "Event '{unknown}' is neither a built-in event nor a declared custom event."
            )));
        }
        if let Some(schema) = &self.schema {
            schema.validate(&event.to_json())?;
        }
        self.warnings.extend(event.coordinator.warnings());
        log::debug!(
            "added campaign event {} ({} so far)",
            event.event_name.as_deref().unwrap_or("<unnamed>"),
            self.events.len() + 1
        );
        self.events.push(event);
        Ok(self)
    }

    #[must_use]
    pub fn events(&self) -> &[CampaignEvent] {
        &self.events
    }

    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Simulator configuration implied by the campaign.
    #[must_use]
    pub fn implicit_config(&self) -> Value {
        json!({ "Custom_Individual_Events": self.custom_events })
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        log::debug!("serializing campaign with {} events", self.events.len());
        json!({
            "Events": self.events.iter().map(CampaignEvent::to_json).collect::<Vec<_>>(),
        })
    }

    /// # Errors
    /// If the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), AuthoringError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.to_json())?;
        writer.flush()?;
        log::debug!("wrote campaign to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use tempfile::tempdir;

    use super::Campaign;
    use crate::coordinators::{
        CampaignEvent, ScheduledCoordinator, Start, Targeting, TriggeredCoordinator,
    };
    use crate::error::AuthoringError;
    use crate::interventions::{BroadcastEvent, Intervention};
    use crate::schema::Schema;
    use crate::targeting::Predicate;

    fn broadcast(event: &str) -> CampaignEvent {
        let coordinator = ScheduledCoordinator::new(
            vec![Intervention::from(BroadcastEvent::new(event).unwrap())],
            Targeting::default(),
        )
        .unwrap();
        CampaignEvent::new(Start::Day(1.0), coordinator)
    }

    #[test]
    fn test_unknown_event_rejected_until_declared() {
        let mut campaign = Campaign::new();
        assert!(campaign.add(broadcast("StartedART")).is_ok());
        assert!(matches!(
            campaign.add(broadcast("LinkToCare")),
            Err(AuthoringError::Configuration(msg)) if msg.contains("LinkToCare")
        ));
        campaign.add_custom_events(["LinkToCare"]).unwrap();
        assert!(campaign.add(broadcast("LinkToCare")).is_ok());
        assert_eq!(campaign.events().len(), 2);
        assert_eq!(
            campaign.implicit_config(),
            json!({"Custom_Individual_Events": ["LinkToCare"]})
        );
        assert!(campaign.add_custom_events([""]).is_err());
    }

    #[test]
    fn test_trigger_names_are_checked() {
        let mut campaign = Campaign::new();
        let coordinator = TriggeredCoordinator::new(
            vec![Intervention::from(BroadcastEvent::new("StartedART").unwrap())],
            &["NeedsART"],
            -1.0,
            Targeting::default(),
        )
        .unwrap();
        assert!(campaign
            .add(CampaignEvent::new(Start::Day(0.0), coordinator))
            .is_err());
    }

    #[test]
    fn test_collects_coordinator_warnings() {
        let friend_of_friend = Predicate::has_relationship()
            .with_partner_who(
                Predicate::has_relationship()
                    .with_partner_who(Predicate::is_hiv_positive())
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let coordinator = ScheduledCoordinator::new(
            vec![Intervention::from(BroadcastEvent::new("Births").unwrap())],
            Targeting {
                predicate: Some(friend_of_friend),
                ..Targeting::default()
            },
        )
        .unwrap();
        let mut campaign = Campaign::new();
        campaign
            .add(CampaignEvent::new(Start::Day(0.0), coordinator))
            .unwrap();
        assert_eq!(campaign.warnings().len(), 1);
    }

    #[test]
    fn test_schema_validation_on_add() {
        let schema = Schema::from_value(&json!({
            "idmTypes": {
                "CampaignEvent": {
                    "class": "CampaignEvent",
                    "Start_Day": {"type": "float", "min": 0, "default": 1},
                    "Nodeset_Config": {"type": "idmType:NodeSet"},
                    "Event_Coordinator_Config": {"type": "idmType:EventCoordinator"}
                },
                "NodeSetAll": {"class": "NodeSetAll"}
            }
        }))
        .unwrap();
        let mut campaign = Campaign::with_schema(schema);
        // StandardInterventionDistributionEventCoordinator is not declared.
        assert!(matches!(
            campaign.add(broadcast("Births")),
            Err(AuthoringError::Schema(_))
        ));
        assert!(campaign.events().is_empty());
    }

    #[test]
    fn test_write_document() {
        let mut campaign = Campaign::new();
        campaign.add(broadcast("Births")).unwrap();
        campaign.add(broadcast("StartedART").with_name("second")).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("campaign.json");
        campaign.write(&path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, campaign.to_json());
        assert_eq!(written["Events"][1]["Event_Name"], "second");
        assert_eq!(
            written["Events"][0]["Event_Coordinator_Config"]["Intervention_Config"]["Broadcast_Event"],
            "Births"
        );
    }
}
