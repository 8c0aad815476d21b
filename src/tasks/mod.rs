pub mod room_sweeper;
