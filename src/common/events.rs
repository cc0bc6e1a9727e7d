/// Events the simulator broadcasts on its own. Any other event name used in a
/// campaign must be registered as a custom event.
pub const BUILT_IN_EVENTS: &[&str] = &[
    "Births",
    "EveryUpdate",
    "EveryTimeStep",
    "NewInfectionEvent",
    "NewlySymptomatic",
    "DiseaseDeaths",
    "NonDiseaseDeaths",
    "Emigrating",
    "Immigrating",
    "Pregnant",
    "GaveBirth",
    "SixWeeksOld",
    "TwelveWeeksPregnant",
    "FourteenWeeksPregnant",
    "ThreeMonthsPostpartum",
    "STIDebut",
    "STIPreEmigrating",
    "STIPostImmigrating",
    "STINewInfection",
    "NewConcurrentRelationship",
    "NewRelationship_TRANSITORY",
    "NewRelationship_INFORMAL",
    "NewRelationship_MARITAL",
    "NewRelationship_COMMERCIAL",
    "ExitedRelationship",
    "EnteredRelationship",
    "FirstCoitalAct",
    "NewExternalHIVInfection",
    "HIVNewlyDiagnosed",
    "HIVTestedPositive",
    "HIVTestedNegative",
    "HIVSymptomatic",
    "HIVPreventionOfMotherToChildTransmission",
    "HIVInfectionStageEnteredAcute",
    "HIVInfectionStageEnteredLatent",
    "HIVInfectionStageEnteredAIDS",
    "HIVInfectionStageEnteredOnART",
    "StartedART",
    "StoppedART",
    "OnART",
];

#[must_use]
pub fn is_built_in(event: &str) -> bool {
    BUILT_IN_EVENTS.contains(&event)
}
