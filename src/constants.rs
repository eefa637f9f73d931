// Default values for editor nodes - these are the single source of truth for defaults
pub const DEFAULT_AGENT_LEVEL: u8 = 2;
pub const MAX_AGENT_LEVEL: u8 = 3;
pub const DEFAULT_MAX_CONCURRENT_TASKS: u32 = 5;
pub const DEFAULT_DEPARTMENT: &str = "General";
pub const DEFAULT_AGENT_NODE_TYPE: &str = "agent";

// Canvas metadata defaults
pub const UNTITLED_AGENT_NETWORK: &str = "Untitled Agent Network";
pub const UNTITLED_WORKFLOW: &str = "Untitled Workflow";
pub const DEFAULT_TEMPLATE_CATEGORY: &str = "custom";

// Grid used when a loaded template carries no positions
pub const GRID_ORIGIN_X: f64 = 100.0;
pub const GRID_ORIGIN_Y: f64 = 100.0;
pub const GRID_COLUMNS: usize = 3;
pub const GRID_COLUMN_WIDTH: f64 = 250.0;
pub const GRID_ROW_HEIGHT: f64 = 200.0;

// Random placement window for freshly added nodes
pub const SPAWN_X_RANGE: (f64, f64) = (100.0, 600.0);
pub const SPAWN_Y_RANGE: (f64, f64) = (100.0, 400.0);

// Edge visuals
pub const DEFAULT_EDGE_TYPE: &str = "smoothstep";
pub const DEFAULT_EDGE_STROKE: &str = "#6366f1";
pub const DEFAULT_EDGE_STROKE_WIDTH: f64 = 2.0;

// Complexity thresholds (strictly greater than)
pub const MEDIUM_NODE_THRESHOLD: usize = 3;
pub const MEDIUM_EDGE_THRESHOLD: usize = 4;
pub const ADVANCED_NODE_THRESHOLD: usize = 6;
pub const ADVANCED_EDGE_THRESHOLD: usize = 8;

// Live channel
pub const DEDUP_WINDOW_MS: i64 = 2_000;
pub const HITL_DEDUP_WINDOW_MS: i64 = 1_000;
pub const RECONNECT_DELAY_MS: u32 = 3_000;
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

// Monitoring
pub const MAX_AGENT_THOUGHTS: usize = 200;
pub const PREVIEW_GRAPHEMES: usize = 80;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

#[cfg(debug_assertions)]
pub const LOG_LEVEL: log::Level = log::Level::Debug;
#[cfg(not(debug_assertions))]
pub const LOG_LEVEL: log::Level = log::Level::Info;
