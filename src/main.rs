fn main() {
    kinetic::app::startup::startup();
}
