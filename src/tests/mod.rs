pub mod test_edge_cases;
