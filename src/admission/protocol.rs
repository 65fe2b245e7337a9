/// Claims one unit of stock. Answers `true` / `false` with HTTP 200.
pub const ENDPOINT_GET_ONE: &str = "/getOne";
/// Counter snapshot for operators.
pub const ENDPOINT_GATE_STATS: &str = "/gate/stats";
