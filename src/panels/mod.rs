pub mod bitmap_ui;
pub mod panel_trait;
pub mod selection_ui;
pub mod stats_ui;

pub use bitmap_ui::BitmapPanel;
pub use panel_trait::{Panel, PanelContext, PanelState};
pub use selection_ui::SelectionPanel;
pub use stats_ui::StatsPanel;
