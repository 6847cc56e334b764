pub mod work {
    pub const TRIGGER: &str = "/work/trigger";
    pub const JOBS: &str = "/work/jobs";
    pub const RESULT: &str = "/work/result";
}

pub mod headers {
    pub const TILE: &str = "x-tile";
    pub const HEIGHT: &str = "x-height";
    pub const WIDTH: &str = "x-width";
}
