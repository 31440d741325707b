fn main() {
    affect_study_lib::run()
}
