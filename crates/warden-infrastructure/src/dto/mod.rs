//! Serialized shapes of the definition file.

mod encounter;

pub use encounter::{
    BossDto, EncounterDocumentDto, EncounterDto, PlayerGateDto, RewardsDto, ScheduleDto, WaveDto,
    parse_definitions,
};
