use crate::scheduling::SchedulingPolicy;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> String;
    fn database_url(&self) -> Option<String>;
    fn scheduling_policy(&self) -> SchedulingPolicy;
    fn notification_channel(&self) -> String;
}
