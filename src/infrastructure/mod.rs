mod transient_sweeper;

pub use transient_sweeper::spawn_transient_sweeper;
