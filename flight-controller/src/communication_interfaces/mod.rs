pub mod control_link;
