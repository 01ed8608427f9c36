pub trait ResultPublisher {
    fn publish(&self, destination: &str, subject: &str, body: &str) -> Result<(), String>;
}
