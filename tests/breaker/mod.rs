mod fail_open;
mod wiring;
